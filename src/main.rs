use anyhow::Result;
use clap::Parser;
use ruledoc::config::DocConfig;
use ruledoc::DocGenerator;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ruledoc")]
#[command(about = "Correlation rule XML export to markdown converter", long_about = None)]
struct Cli {
    /// Path to the correlation rule XML export
    input: PathBuf,

    /// Path of the markdown document to write
    output: PathBuf,

    /// Path to the style configuration file
    #[arg(short, long, default_value = "ruledoc.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    let config = DocConfig::load_or_default(&args.config)?;
    let generator = DocGenerator::new(config);
    let summary = generator.run(&args.input, &args.output)?;
    println!(
        "Documented {} rules ({} diagrams) -> {}",
        summary.rules_rendered,
        summary.diagrams_rendered(),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_both_positional_arguments() {
        assert!(Cli::try_parse_from(["ruledoc"]).is_err());
        assert!(Cli::try_parse_from(["ruledoc", "in.xml"]).is_err());
        assert!(Cli::try_parse_from(["ruledoc", "in.xml", "out.md"]).is_ok());
        assert!(Cli::try_parse_from(["ruledoc", "in.xml", "out.md", "extra"]).is_err());
    }
}
