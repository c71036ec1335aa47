//! forge – command-line HTML converter.
//!
//! Usage:
//!   forge <input.html> [--type pdf]... [--out-dir dir] [--name stem]
//!         [--settings settings.json] [--backend path] [--timeout secs] [--outline]
//!
//! Each requested type is rendered by its own `forge-backend` process into
//! `<out-dir>/<stem>.<ext>`. Without `--type` the types listed in the
//! settings file are produced (PDF by default).

use std::{env, fs, path::PathBuf, process, time::Duration};

use page_forge::outline::outline;
use page_forge::{Converter, OutputType, Settings};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut types: Vec<OutputType> = Vec::new();
    let mut out_dir: Option<PathBuf> = None;
    let mut stem: Option<String> = None;
    let mut settings_path: Option<PathBuf> = None;
    let mut backend: Option<PathBuf> = None;
    let mut timeout: Option<u64> = None;
    let mut print_outline = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--type" | "-t" => {
                let value = flag_value(&mut iter, arg, &args[0]);
                match value.parse() {
                    Ok(ty) => types.push(ty),
                    Err(e) => usage_error(&e, &args[0]),
                }
            }
            "--out-dir" | "-o" => out_dir = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0]))),
            "--name" | "-n" => stem = Some(flag_value(&mut iter, arg, &args[0]).to_string()),
            "--settings" | "-s" => {
                settings_path = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0])))
            }
            "--backend" => backend = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0]))),
            "--timeout" => {
                let value = flag_value(&mut iter, arg, &args[0]);
                match value.parse::<u64>() {
                    Ok(secs) if secs > 0 => timeout = Some(secs),
                    _ => usage_error(&format!("invalid timeout {value:?}"), &args[0]),
                }
            }
            "--outline" => print_outline = true,
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => usage_error(&format!("Unknown flag: {other}"), &args[0]),
            path => {
                if input_path.is_some() {
                    usage_error(&format!("Unexpected argument: {path}"), &args[0]);
                }
                input_path = Some(PathBuf::from(path));
            }
        }
    }

    let input = match input_path {
        Some(p) => p,
        None => usage_error("Error: no input file specified.", &args[0]),
    };

    let mut settings = match &settings_path {
        Some(path) => match Settings::load(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
        None => Settings::default(),
    };

    let html = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            process::exit(1);
        }
    };

    // `--outline` turns the table of contents on for this run.
    settings.toc.enabled |= print_outline;
    if settings.toc.enabled {
        match serde_json::to_string_pretty(&outline(&html, &settings.toc)) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }

    // Defaults: settings' types, the input's directory and stem.
    if types.is_empty() {
        types = settings.conversion_types.clone();
    }
    let document_root = input
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let out_dir = out_dir.unwrap_or_else(|| document_root.clone());
    let stem = stem.unwrap_or_else(|| {
        input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("forge-output")
            .to_string()
    });

    let mut config = settings.backend_config();
    if let Some(program) = backend {
        config.program = program;
    }
    if let Some(secs) = timeout {
        config.timeout = Duration::from_secs(secs);
    }

    let document = settings.document(html, &document_root);
    let converter = Converter::with_config(config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            process::exit(1);
        }
    };
    let outcomes = runtime.block_on(converter.convert_all(&document, &types, &out_dir, &stem));

    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(path) => eprintln!("Wrote '{}' ({})", path.display(), outcome.output_type),
            Err(e) => {
                failed += 1;
                eprintln!("Error converting to {}: {e}", outcome.output_type);
            }
        }
    }
    if failed > 0 {
        process::exit(1);
    }
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> &'a str {
    match iter.next() {
        Some(v) => v,
        None => usage_error(&format!("{flag} needs a value"), prog),
    }
}

fn usage_error(message: &str, prog: &str) -> ! {
    eprintln!("{message}");
    print_usage(prog);
    process::exit(2);
}

fn print_usage(prog: &str) {
    eprintln!("forge – HTML converter (page-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [--type <t>]... [--out-dir <dir>] [--name <stem>]");
    eprintln!("        [--settings <file.json>] [--backend <path>] [--timeout <secs>] [--outline]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.html>      HTML file to convert");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --type, -t        Output type: pdf, png, jpeg, bmp, ppm or html (repeatable)");
    eprintln!("  --out-dir, -o     Output directory (default: the input's directory)");
    eprintln!("  --name, -n        Output file stem (default: the input's stem)");
    eprintln!("  --settings, -s    JSON settings file (layout, headers, footers, stylesheets)");
    eprintln!("  --backend         Render backend executable (default: forge-backend)");
    eprintln!("  --timeout         Seconds a backend may run before it is killed (default: 60)");
    eprintln!("  --outline         Print the heading outline as JSON (implied by toc.enabled)");
    eprintln!("  --help            Print this message");
}
