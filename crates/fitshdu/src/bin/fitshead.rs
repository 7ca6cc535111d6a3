use std::path::PathBuf;
use std::process;

use clap::Parser;
use fitshdu::card::{format_card, FormatOptions, NumberFormat};
use fitshdu::{Card, FitsFile, Hdu};

/// Print FITS HDU summaries and header cards.
#[derive(Debug, Clone, Parser)]
#[command(name = "fitshead", version, about = "Print FITS HDU summaries and header cards")]
struct Args {
    /// FITS file to read
    #[arg(value_name = "FILE")]
    path: PathBuf,

    /// Only this HDU, by 1-based number or by EXTNAME/HDUNAME
    #[arg(short = 'H', long = "hdu", value_name = "HDU")]
    hdu: Option<String>,

    /// Print the value of one keyword instead of the header
    #[arg(short = 'k', long = "key", value_name = "KEYWORD")]
    key: Option<String>,

    /// List HDUs without their cards
    #[arg(short = 's', long = "summary")]
    summary: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fitshdu={level}")));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn card_lines(card: &Card) -> Result<String, String> {
    let free = FormatOptions {
        number_format: NumberFormat::Free,
    };
    let records = format_card(card, &FormatOptions::default())
        .or_else(|_| format_card(card, &free))
        .map_err(|e| format!("Error formatting {}: {}", card.name, e))?;
    let mut out = String::new();
    for record in records {
        out.push_str(String::from_utf8_lossy(&record).trim_end());
        out.push('\n');
    }
    Ok(out)
}

fn format_hdu(hdu: &Hdu, summary: bool) -> Result<String, String> {
    let mut out = hdu.describe().map_err(|e| e.to_string())?;
    out.push('\n');
    if summary {
        return Ok(out);
    }
    for card in hdu.cards() {
        let card = card.map_err(|e| format!("HDU {}: {}", hdu.num(), e))?;
        out.push_str(&card_lines(&card)?);
    }
    out.push_str("END\n");
    Ok(out)
}

fn select_hdu(file: &FitsFile, selector: &str) -> Result<Hdu, String> {
    let found = match selector.parse::<usize>() {
        Ok(num) => file.move_to(num).map(Some),
        Err(_) => file.hdu_by_name(selector),
    };
    found
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("No HDU named '{}'", selector))
}

fn report(file: &FitsFile, args: &Args) -> Result<String, String> {
    let hdus: Vec<Hdu> = match &args.hdu {
        Some(selector) => vec![select_hdu(file, selector)?],
        None => file
            .hdus()
            .and_then(|iter| iter.collect())
            .map_err(|e| e.to_string())?,
    };

    let mut out = String::new();
    if let Some(key) = &args.key {
        for hdu in &hdus {
            if let Some(card) = hdu.card(key.as_str()).map_err(|e| e.to_string())? {
                let value = card.value.map(|v| v.to_string()).unwrap_or_default();
                out.push_str(&format!("{}: {} = {}\n", hdu.num(), card.name, value));
            }
        }
    } else {
        for (i, hdu) in hdus.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format_hdu(hdu, args.summary)?);
        }
    }
    Ok(out)
}

/// Build the report for `file`, then close it whether or not that worked.
fn report_and_close(file: &FitsFile, args: &Args) -> Result<String, String> {
    let out = report(file, args);
    file.close().map_err(|e| e.to_string())?;
    out
}

fn run(args: &Args) -> Result<String, String> {
    let file = FitsFile::open(&args.path)
        .map_err(|e| format!("Error reading '{}': {}", args.path.display(), e))?;
    report_and_close(&file, args)
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);
    match run(&args) {
        Ok(output) => print!("{}", output),
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(1);
        }
    }
}
