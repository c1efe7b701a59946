//! Shadowmaps CLI - interactive viewer and one-shot frame renders.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use image::RgbaImage;

use shadowmaps::prelude::*;
use shadowmaps::target::save_image;
use shadowmaps::util::init_tracing;

const DEFAULT_SIZE: ViewportSize = ViewportSize::new(800, 600);
const DEFAULT_SEED: u64 = 1;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = log::LevelFilter::Info;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = log::LevelFilter::Debug,
            "-vv" | "--trace" => level = log::LevelFilter::Trace,
            "-q" | "--quiet" => level = log::LevelFilter::Warn,
            _ => filtered_args.push(arg),
        }
    }
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let Some((command, rest)) = filtered_args.split_first() else {
        print_help();
        return ExitCode::SUCCESS;
    };

    let result = match *command {
        "view" | "v" => cmd_view(rest),
        "render" | "r" => cmd_render(rest),
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("Shadowmaps {} - SM, RSM and ISM shadows", env!("CARGO_PKG_VERSION"));
    println!("Built {}", env!("SHADOWMAPS_BUILD_DATE"));
    println!();
    println!("USAGE:");
    println!("    shadowmaps [options] <command> [args]");
    println!();
    println!("COMMANDS:");
    println!("    v, view   [mesh] [--receiver box|checker]   Open the interactive viewer");
    println!("    r, render [mesh] [render options]           Render one frame to an image");
    println!("    h, help                                     Show this help");
    println!();
    println!("RENDER OPTIONS:");
    println!("    --mode sm|rsm|ism        Shadow technique (default ism)");
    println!("    --out <file>             PNG or JPEG output (default shadowmaps_<mode>.png)");
    println!("    --size <W>x<H>           Frame size (default {}x{})", DEFAULT_SIZE.width, DEFAULT_SIZE.height);
    println!("    --seed <n>               Sampling seed (default {})", DEFAULT_SEED);
    println!("    --dump <dir>             Write intermediate buffers to <dir>");
    println!("    --receiver box|checker   Shadow receiver (default box)");
    println!("    --gpu                    Render on a windowless GPU device");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose   Debug output");
    println!("    -vv, --trace    Trace output (very verbose)");
    println!("    -q, --quiet     Warnings and errors only");
    println!();
    println!("Set SHADOWMAPS_TRACE=1 to write a Chrome trace to trace.json.");
}

fn cmd_view(args: &[&str]) -> Result<()> {
    let mut mesh = None;
    let mut receiver = None;
    let mut it = args.iter();
    while let Some(&arg) = it.next() {
        match arg {
            "--receiver" => receiver = Some(value(&mut it, arg)?.parse::<ReceiverKind>()?),
            flag if flag.starts_with("--") => bail!("unknown view option {}", flag),
            path => mesh = Some(PathBuf::from(path)),
        }
    }
    view(mesh, receiver)
}

#[cfg(feature = "viewer")]
fn view(mesh: Option<PathBuf>, receiver: Option<ReceiverKind>) -> Result<()> {
    shadowmaps::viewer::run(mesh, receiver)
}

#[cfg(not(feature = "viewer"))]
fn view(_mesh: Option<PathBuf>, _receiver: Option<ReceiverKind>) -> Result<()> {
    bail!("Viewer not available. Rebuild with: cargo build --features viewer")
}

/// Options of the `render` command.
#[derive(Debug, Clone, PartialEq)]
struct RenderArgs {
    mesh: Option<PathBuf>,
    mode: ShadowMode,
    out: Option<PathBuf>,
    size: ViewportSize,
    seed: u64,
    dump: Option<PathBuf>,
    receiver: ReceiverKind,
    gpu: bool,
}

impl Default for RenderArgs {
    fn default() -> Self {
        Self {
            mesh: None,
            mode: ShadowMode::default(),
            out: None,
            size: DEFAULT_SIZE,
            seed: DEFAULT_SEED,
            dump: None,
            receiver: ReceiverKind::default(),
            gpu: false,
        }
    }
}

impl RenderArgs {
    fn parse(args: &[&str]) -> Result<Self> {
        let mut parsed = Self::default();
        let mut it = args.iter();
        while let Some(&arg) = it.next() {
            match arg {
                "--mode" => parsed.mode = value(&mut it, arg)?.parse()?,
                "--out" | "-o" => parsed.out = Some(PathBuf::from(value(&mut it, arg)?)),
                "--size" => parsed.size = parse_size(value(&mut it, arg)?)?,
                "--seed" => {
                    let text = value(&mut it, arg)?;
                    parsed.seed = text
                        .parse()
                        .with_context(|| format!("invalid seed '{}'", text))?;
                }
                "--dump" => parsed.dump = Some(PathBuf::from(value(&mut it, arg)?)),
                "--receiver" => parsed.receiver = value(&mut it, arg)?.parse()?,
                "--gpu" => parsed.gpu = true,
                flag if flag.starts_with("--") => bail!("unknown render option {}", flag),
                path => parsed.mesh = Some(PathBuf::from(path)),
            }
        }
        Ok(parsed)
    }

    fn output_path(&self) -> PathBuf {
        self.out.clone().unwrap_or_else(|| {
            PathBuf::from(format!("shadowmaps_{}.png", self.mode.label().to_ascii_lowercase()))
        })
    }

    fn config(&self) -> RenderConfig {
        RenderConfig {
            seed: Seed::Fixed(self.seed),
            dump_dir: self.dump.clone(),
            ..Default::default()
        }
    }
}

fn value<'a>(it: &mut std::slice::Iter<'_, &'a str>, flag: &str) -> Result<&'a str> {
    match it.next() {
        Some(v) => Ok(v),
        None => bail!("{} needs a value", flag),
    }
}

fn parse_size(text: &str) -> Result<ViewportSize> {
    let parsed = text
        .split_once(['x', 'X'])
        .and_then(|(w, h)| Some(ViewportSize::new(w.trim().parse().ok()?, h.trim().parse().ok()?)));
    match parsed {
        Some(size) if !size.is_empty() => Ok(size),
        _ => bail!("invalid size '{}' (expected <width>x<height>)", text),
    }
}

fn cmd_render(args: &[&str]) -> Result<()> {
    let _trace_guard = init_tracing();
    let args = RenderArgs::parse(args)?;
    let scene = Scene::load(args.mesh.as_deref(), args.receiver)
        .with_context(|| format!("Failed to load scene from {}", describe(args.mesh.as_deref())))?;

    let frame = if args.gpu {
        render_gpu(&args, &scene)?
    } else {
        render_with(SoftwareBackend::new(), &args, &scene)?
    };

    let out = args.output_path();
    save_image(&frame, &out).with_context(|| format!("Failed to save {}", out.display()))?;
    println!("{} frame {}x{} -> {}", args.mode, args.size.width, args.size.height, out.display());
    Ok(())
}

#[cfg(feature = "viewer")]
fn render_gpu(args: &RenderArgs, scene: &Scene) -> Result<RgbaImage> {
    let renderer = shadowmaps::viewer::Renderer::headless()?;
    render_with(renderer, args, scene)
}

#[cfg(not(feature = "viewer"))]
fn render_gpu(_args: &RenderArgs, _scene: &Scene) -> Result<RgbaImage> {
    bail!("GPU rendering not available. Rebuild with: cargo build --features viewer")
}

/// Render one frame from the default camera pose.
fn render_with<B: RenderBackend>(backend: B, args: &RenderArgs, scene: &Scene) -> Result<RgbaImage> {
    let config = args.config();
    let camera = ArcballController::new(config.camera, args.size);
    let mut pipeline = ShadowPipeline::new(backend, config)?;
    pipeline.set_mode(args.mode);

    pipeline.render_frame(scene, &camera.transforms(), args.size)?;
    if let Some(vpls) = pipeline.vpls() {
        log::info!("Rendered with {} VPLs", vpls.len());
    }
    Ok(pipeline.read_back_frame()?)
}

fn describe(mesh: Option<&Path>) -> String {
    match mesh {
        Some(path) => path.display().to_string(),
        None => "the default cube".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_args() {
        let args = RenderArgs::parse(&[
            "--mode", "rsm", "--size", "320x240", "--seed", "7", "--receiver", "checker", "bunny.obj",
        ])
        .unwrap();
        assert_eq!(args.mode, ShadowMode::Rsm);
        assert_eq!(args.size, ViewportSize::new(320, 240));
        assert_eq!(args.seed, 7);
        assert_eq!(args.receiver, ReceiverKind::CheckerFloor);
        assert_eq!(args.mesh, Some(PathBuf::from("bunny.obj")));
        assert!(!args.gpu);
        assert_eq!(args.output_path(), PathBuf::from("shadowmaps_rsm.png"));
        assert_eq!(args.config().seed, Seed::Fixed(7));
    }

    #[test]
    fn test_render_args_errors() {
        assert!(RenderArgs::parse(&["--mode"]).is_err());
        assert!(RenderArgs::parse(&["--mode", "pcss"]).is_err());
        assert!(RenderArgs::parse(&["--size", "0x10"]).is_err());
        assert!(RenderArgs::parse(&["--size", "640"]).is_err());
        assert!(RenderArgs::parse(&["--fast"]).is_err());
    }
}
