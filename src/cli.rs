//! Hand-rolled command-line argument parsing.

use std::env;
use std::path::PathBuf;

#[derive(Debug)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub cycles: Option<u64>,
    pub telemetry_out: Option<PathBuf>,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut config = None;
    let mut cycles = None;
    let mut telemetry_out = None;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| "missing value for --config (expected a TOML file path)".to_string())?;
                if config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--cycles" => {
                i += 1;
                let raw = args
                    .get(i)
                    .ok_or_else(|| "missing value for --cycles (expected a cycle count)".to_string())?;
                let n: u64 = raw
                    .parse()
                    .map_err(|_| format!("invalid value for --cycles: `{raw}`"))?;
                if cycles.replace(n).is_some() {
                    return Err("--cycles provided more than once".to_string());
                }
            }
            "--telemetry-out" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| "missing value for --telemetry-out (expected a file path)".to_string())?;
                if telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument `{other}` (try --help)"));
            }
        }
        i += 1;
    }

    Ok(CliOptions {
        config,
        cycles,
        telemetry_out,
    })
}

fn print_usage() {
    eprintln!("sitecap — site import-ceiling enforcement for EV charging");
    eprintln!();
    eprintln!("Usage: sitecap [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load site configuration from TOML (default: demo site)");
    eprintln!("  --cycles <n>             Run n control cycles and exit (default: run forever)");
    eprintln!("  --telemetry-out <path>   Export per-cycle records to CSV (bounded runs only)");
    eprintln!("  --help                   Show this help message");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_args_yield_defaults() {
        let options = parse_args_from(Vec::new()).unwrap();
        assert!(options.config.is_none());
        assert!(options.cycles.is_none());
        assert!(options.telemetry_out.is_none());
    }

    #[test]
    fn all_options_parse() {
        let options = parse_args_from(
            ["--config", "site.toml", "--cycles", "24", "--telemetry-out", "out.csv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        assert_eq!(options.config.unwrap().to_str(), Some("site.toml"));
        assert_eq!(options.cycles, Some(24));
        assert_eq!(options.telemetry_out.unwrap().to_str(), Some("out.csv"));
    }

    #[test]
    fn duplicate_flag_is_rejected() {
        let err = parse_args_from(
            ["--cycles", "2", "--cycles", "3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap_err();
        assert!(err.contains("more than once"));
    }

    #[test]
    fn non_numeric_cycles_is_rejected() {
        let err = parse_args_from(
            ["--cycles", "many"].iter().map(|s| s.to_string()).collect(),
        )
        .unwrap_err();
        assert!(err.contains("--cycles"));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let err = parse_args_from(vec!["--verbose".to_string()]).unwrap_err();
        assert!(err.contains("--verbose"));
    }
}
