//! forge-backend – renders one document payload into one artifact.
//!
//! Usage:
//!   forge-backend <BMP|JPEG|PNG|PPM|PDF> <payload.json> <destination>
//!
//! On success the destination path is printed on stdout; the converter
//! treats that line as confirmation that the file is complete.

use std::{env, path::PathBuf, process};

use page_forge::backend;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        print_usage(args.first().map_or("forge-backend", String::as_str));
        process::exit(2);
    }

    let payload = PathBuf::from(&args[2]);
    let destination = PathBuf::from(&args[3]);
    match backend::run(&args[1], &payload, &destination) {
        Ok(written) => println!("{}", written.display()),
        Err(e) => {
            eprintln!("Error rendering '{}': {e}", destination.display());
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("forge-backend – page-forge render backend");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <BMP|JPEG|PNG|PPM|PDF> <payload.json> <destination>");
    eprintln!();
    eprintln!("Unknown output types are rendered as PDF.");
}
