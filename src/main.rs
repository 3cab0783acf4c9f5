use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use netalloc::request::load_request;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Allocate a resource from a pool, or report the pool's capacity
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the allocation request (JSON, or YAML with a .yaml/.yml extension)
    #[arg(short, long)]
    request: PathBuf,

    /// Report free and utilized capacity instead of allocating
    #[arg(long)]
    capacity: bool,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,

    /// Write the result to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Request file: {:?}", args.request);

    let request = load_request(&args.request)?;
    let kind = request.kind()?;
    let strategy = request.build().wrap_err_with(|| format!("Failed to set up {} strategy", kind))?;

    let json = if args.capacity {
        let report = strategy
            .capacity()
            .wrap_err_with(|| format!("Failed to compute {} capacity", kind))?;
        to_json(&report, args.pretty)?
    } else {
        let allocated = strategy
            .allocate()
            .wrap_err_with(|| format!("Failed to allocate from {} pool", kind))?;
        to_json(&allocated, args.pretty)?
    };

    match &args.output {
        Some(path) => {
            fs::write(path, format!("{}\n", json))
                .wrap_err_with(|| format!("Failed to write result to '{}'", path.display()))?;
            info!("Result written to {:?}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netalloc::props;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["netalloc", "--request", "request.json"]);

        assert_eq!(args.request, PathBuf::from("request.json"));
        assert!(!args.capacity);
        assert!(!args.pretty);
        assert_eq!(args.output, None);
    }

    #[test]
    fn test_capacity_args() {
        let args = Args::parse_from([
            "netalloc",
            "-r",
            "pool.yaml",
            "--capacity",
            "--pretty",
            "--output",
            "capacity.json",
        ]);

        assert!(args.capacity);
        assert!(args.pretty);
        assert_eq!(args.output, Some(PathBuf::from("capacity.json")));
    }

    #[test]
    fn test_request_is_required() {
        assert!(Args::try_parse_from(["netalloc", "--capacity"]).is_err());
    }

    #[test]
    fn test_json_rendering() {
        let bag = props! { "vlan" => 7 };
        assert_eq!(to_json(&bag, false).unwrap(), r#"{"vlan":7}"#);
        assert!(to_json(&bag, true).unwrap().contains('\n'));
    }
}
