//! Self-signed localhost certificate for local play.
//!
//! Run from the repository root with
//! `cargo run --manifest-path scripts/Cargo.toml`. Writes `certs/cert.pem`
//! and `certs/key.pem`, which the server picks up when `TLS_CERT_PATH` and
//! `TLS_KEY_PATH` are unset.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::digest::{digest, SHA256};

/// Browsers only pin certificates valid for at most two weeks
const VALIDITY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

fn certs_dir() -> PathBuf {
    // The manifest lives in scripts/; certs/ sits next to it
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("certs")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = certs_dir();
    let cert_file = dir.join("cert.pem");
    let key_file = dir.join("key.pem");
    let force = std::env::args().any(|a| a == "--force");

    if cert_file.exists() && key_file.exists() && !force {
        println!("Certificate already present in {}", dir.display());
        println!("Pass --force to replace it.\n");
        print_hash(&cert_file)?;
        return Ok(());
    }

    fs::create_dir_all(&dir)?;

    let mut params = CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])?;
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, "Corsair Server Dev");
    name.push(DnType::OrganizationName, "Corsair");
    params.distinguished_name = name;

    let now = SystemTime::now();
    params.not_before = now.into();
    params.not_after = (now + VALIDITY).into();

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;
    fs::write(&cert_file, cert.pem())?;
    fs::write(&key_file, key_pair.serialize_pem())?;

    println!("Wrote {}", cert_file.display());
    println!("Wrote {}\n", key_file.display());
    print_hash(&cert_file)?;
    Ok(())
}

/// The value browsers expect in `serverCertificateHashes`
fn print_hash(cert_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let pem = pem::parse(fs::read_to_string(cert_file)?)?;
    let hash = STANDARD.encode(digest(&SHA256, pem.contents()).as_ref());
    println!("Certificate hash (SHA-256, base64): {hash}");
    println!("Expires in {} days; rerun with --force after that.", VALIDITY.as_secs() / 86_400);
    Ok(())
}
