//! Command-line parsing: one positional resource directory plus `--flag=value` options.

use platform::RunConfig;

pub const USAGE: &str = "\
Please specify the resource directory.

Usage: app <resource_dir> [options]

Options:
  --gpu-backend=auto|vulkan|dx12|metal|gl
  --size=WxH | --width=W --height=H   (default 640x480)
  --mesh=FILE                         (default bunny.obj)
  --show-fps[=on|off]";

#[derive(Debug)]
pub enum Command {
    /// No resource directory given: print usage and exit successfully.
    Usage,
    Run(RunConfig),
}

pub fn parse<I>(args: I) -> Command
where
    I: IntoIterator<Item = String>,
{
    let mut resource_dir: Option<String> = None;
    let mut backends = wgpu::Backends::all(); // default = auto
    let mut mesh_file: Option<String> = None;
    let mut show_fps = false;
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = parse_backend(val);
        } else if arg == "--show-fps" {
            show_fps = true;
        } else if let Some(val) = arg.strip_prefix("--show-fps=") {
            show_fps = matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        } else if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        } else if let Some(v) = arg.strip_prefix("--mesh=") {
            mesh_file = Some(v.to_owned());
        } else if arg.starts_with("--") {
            log::warn!("Ignoring unknown option '{}'", arg);
        } else if resource_dir.is_none() {
            resource_dir = Some(arg);
        } else {
            log::warn!("Ignoring extra argument '{}'", arg);
        }
    }

    let Some(dir) = resource_dir else {
        return Command::Usage;
    };

    let mut config = RunConfig::new(dir);
    config.backends = backends;
    config.show_fps = show_fps;
    config.width = w.unwrap_or(config.width).max(1);
    config.height = h.unwrap_or(config.height).max(1);
    if let Some(mesh) = mesh_file {
        config.mesh_file = mesh;
    }
    Command::Run(config)
}

fn parse_backend(val: &str) -> wgpu::Backends {
    match val.to_ascii_lowercase().as_str() {
        "auto" => wgpu::Backends::all(),
        "vulkan" | "vk" => wgpu::Backends::VULKAN,
        "dx12" | "d3d12" => wgpu::Backends::DX12,
        "metal" | "mtl" => wgpu::Backends::METAL,
        "gl" | "opengl" | "gles" => wgpu::Backends::GL,
        other => {
            log::warn!("Unknown backend '{}', falling back to auto.", other);
            wgpu::Backends::all()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run_config(list: &[&str]) -> RunConfig {
        match parse(args(list)) {
            Command::Run(config) => config,
            Command::Usage => panic!("expected a run config for {list:?}"),
        }
    }

    #[test]
    fn no_arguments_means_usage() {
        assert!(matches!(parse(Vec::new()), Command::Usage));
    }

    #[test]
    fn options_alone_still_mean_usage() {
        assert!(matches!(parse(args(&["--show-fps", "--size=800x600"])), Command::Usage));
    }

    #[test]
    fn resource_dir_only_uses_defaults() {
        let config = run_config(&["../resources"]);
        assert_eq!(config.resource_dir, PathBuf::from("../resources"));
        assert_eq!(config.mesh_file, "bunny.obj");
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.backends, wgpu::Backends::all());
        assert!(!config.show_fps);
    }

    #[test]
    fn flags_override_defaults() {
        let config = run_config(&[
            "--gpu-backend=GL",
            "res",
            "--size=1024X768",
            "--mesh=cube.obj",
            "--show-fps=on",
        ]);
        assert_eq!(config.backends, wgpu::Backends::GL);
        assert_eq!((config.width, config.height), (1024, 768));
        assert_eq!(config.mesh_file, "cube.obj");
        assert!(config.show_fps);
    }

    #[test]
    fn bad_values_fall_back() {
        let config = run_config(&["res", "--gpu-backend=glide", "--size=big", "--height=0"]);
        assert_eq!(config.backends, wgpu::Backends::all());
        assert_eq!((config.width, config.height), (640, 1));
    }

    #[test]
    fn first_positional_wins() {
        let config = run_config(&["first", "second"]);
        assert_eq!(config.resource_dir, PathBuf::from("first"));
    }
}
