//! WIPECERT CLI
//!
//! Offline key generation, canonicalization, signing and signature checks.
//! Nothing here talks to the ledger.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};
use console::style;
use indicatif::ProgressBar;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wipecert_certify::{KeyPair, load_verifier, seal};
use wipecert_core::{CanonicalMode, canonicalize};

#[derive(Parser)]
#[command(name = "wipecert")]
#[command(about = "WIPECERT - offline certificate tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an RSA signing keypair
    Keygen {
        /// Output directory for private.pem and public.pem
        #[arg(short, long)]
        out: PathBuf,
        /// Modulus size
        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },
    /// Print the canonical form of a document
    Canonicalize {
        /// JSON document
        document: PathBuf,
        /// Key ordering policy
        #[arg(long, default_value = "recursive")]
        mode: CanonicalMode,
    },
    /// Sign a document and print its signature and digest
    Sign {
        /// Private key PEM
        #[arg(short, long)]
        key: PathBuf,
        /// JSON document
        document: PathBuf,
        /// Key ordering policy
        #[arg(long, default_value = "recursive")]
        mode: CanonicalMode,
    },
    /// Check a signature against a public key
    Check {
        /// Public key PEM
        #[arg(short, long)]
        key: PathBuf,
        /// JSON document
        document: PathBuf,
        /// Base64 signature text
        signature: String,
        /// Key ordering policy
        #[arg(long, default_value = "recursive")]
        mode: CanonicalMode,
    },
}

#[derive(Debug, Serialize)]
struct SignOutput {
    signature: String,
    digest: String,
}

fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("parsing {}", path.display()))
}

fn keygen(out: &Path, bits: usize) -> Result<(PathBuf, PathBuf)> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("generating {bits}-bit RSA key"));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let keys = KeyPair::generate(bits);
    spinner.finish_and_clear();

    let paths = keys?.write_pem(out)?;
    Ok(paths)
}

fn sign(key: &Path, document: &Path, mode: CanonicalMode) -> Result<SignOutput> {
    let keys = KeyPair::load(key, None)?;
    let sealed = seal(&keys, &read_document(document)?, mode)?;
    Ok(SignOutput {
        signature: sealed.signature,
        digest: sealed.digest.to_hex(),
    })
}

fn check(key: &Path, document: &Path, signature: &str, mode: CanonicalMode) -> Result<bool> {
    let verifier = load_verifier(key)?;
    let canonical = canonicalize(&read_document(document)?, mode)?;
    Ok(verifier.verify(canonical.as_bytes(), signature))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { out, bits } => {
            let (private, public) = keygen(&out, bits)?;
            println!("{} {}", style("private key:").bold(), private.display());
            println!("{} {}", style("public key: ").bold(), public.display());
            Ok(())
        }
        Commands::Canonicalize { document, mode } => {
            let canonical = canonicalize(&read_document(&document)?, mode)?;
            println!("{}", canonical);
            Ok(())
        }
        Commands::Sign {
            key,
            document,
            mode,
        } => {
            let output = sign(&key, &document, mode)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Check {
            key,
            document,
            signature,
            mode,
        } => {
            if check(&key, &document, &signature, mode)? {
                println!("{}", style("signature valid").green());
                Ok(())
            } else {
                bail!("signature invalid")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mode_argument_parses() {
        let cli = Cli::try_parse_from(["wipecert", "canonicalize", "doc.json", "--mode", "top-level"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Canonicalize {
                mode: CanonicalMode::TopLevel,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["wipecert", "canonicalize", "doc.json", "--mode", "sorted"]).is_err());
    }

    #[test]
    fn test_keygen_sign_check() {
        let dir = tempfile::tempdir().unwrap();
        let (private, public) = keygen(&dir.path().join("keys"), 1024).unwrap();

        let doc = dir.path().join("doc.json");
        std::fs::write(&doc, r#"{"wipedBy":"op1","device":"X1"}"#).unwrap();

        let signed = sign(&private, &doc, CanonicalMode::Recursive).unwrap();
        assert_eq!(signed.digest.len(), 64);
        assert!(check(&public, &doc, &signed.signature, CanonicalMode::Recursive).unwrap());

        let tampered = dir.path().join("tampered.json");
        std::fs::write(&tampered, r#"{"wipedBy":"op2","device":"X1"}"#).unwrap();
        assert!(!check(&public, &tampered, &signed.signature, CanonicalMode::Recursive).unwrap());
    }

    #[test]
    fn test_keygen_rejects_tiny_keys() {
        let dir = tempfile::tempdir().unwrap();
        assert!(keygen(dir.path(), 256).is_err());
    }

    #[test]
    fn test_read_document_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_document(&dir.path().join("absent.json")).is_err());
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{").unwrap();
        assert!(read_document(&bad).is_err());
    }
}
