fn main() {
    let now = time::OffsetDateTime::now_utc();
    let date_fmt = time::format_description::parse("[month repr:short] [day padding:space] [year]")
        .expect("valid date format");

    let date = std::env::var("SHADOWMAPS_BUILD_DATE")
        .unwrap_or_else(|_| now.format(&date_fmt).unwrap_or_else(|_| "unknown".to_string()));

    println!("cargo:rustc-env=SHADOWMAPS_BUILD_DATE={}", date);
    println!("cargo:rerun-if-env-changed=SHADOWMAPS_BUILD_DATE");
}
