//! Extract command implementation.
//!
//! Applies the job's rules to a saved page without touching the network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use sieve_core::{ContentKind, Document, RuleResolver, StructuredData, TransformRegistry};
use tracing::debug;
use url::Url;

use crate::output::Printer;
use crate::{Cli, ExitCode};

/// Arguments for `extract`.
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Saved page to extract from.
    #[arg(long, short = 'i')]
    pub file: PathBuf,

    /// Payload kind (guessed from the extension or content when omitted).
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,

    /// URL the page was fetched from, used to absolutize links.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Also print page metadata and links (HTML only).
    #[arg(long)]
    pub metadata: bool,

    /// Also print images, tables, forms, and microdata (HTML only).
    #[arg(long)]
    pub structure: bool,
}

/// Payload kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Html,
    Json,
}

impl From<KindArg> for ContentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Html => ContentKind::Html,
            KindArg::Json => ContentKind::Json,
        }
    }
}

/// Run the extract command.
pub fn run(args: &ExtractArgs, cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    config.validate()?;

    let body = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let kind = args
        .kind
        .map_or_else(|| guess_kind(&args.file, &body), ContentKind::from);
    debug!(file = %args.file.display(), kind = %kind.as_str(), bytes = body.len(), "Extracting");

    let resolver = RuleResolver::with_rules(Arc::new(TransformRegistry::new()), config.rules)?;

    let mut document = Document::from_bytes(&body, kind)?;
    if let Some(base) = &args.base_url {
        let base = Url::parse(base).with_context(|| format!("invalid base URL '{base}'"))?;
        document = document.with_base_url(base);
    }

    let result = resolver.extract(&document)?;
    let structure = if args.structure {
        Some(document.structured_data())
    } else if args.metadata {
        Some(StructuredData {
            metadata: document.metadata(),
            links: document.links(),
            ..StructuredData::default()
        })
    } else {
        None
    };

    let printer = Printer::new(cli.format, cli.pretty, cli.use_colors());
    let source = args.file.display().to_string();
    printer.emit(&printer.render_extraction(&source, &result, structure.as_ref())?)?;

    Ok(if result.is_complete() {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    })
}

fn guess_kind(path: &Path, body: &[u8]) -> ContentKind {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => ContentKind::Json,
        Some(ext) if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm") => {
            ContentKind::Html
        }
        _ => ContentKind::sniff(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_kind_prefers_extension() {
        assert_eq!(guess_kind(Path::new("page.JSON"), b"<html>"), ContentKind::Json);
        assert_eq!(guess_kind(Path::new("page.htm"), b"{}"), ContentKind::Html);
        assert_eq!(guess_kind(Path::new("dump.txt"), b"  [1, 2]"), ContentKind::Json);
        assert_eq!(guess_kind(Path::new("dump"), b"<p>hi</p>"), ContentKind::Html);
    }
}
