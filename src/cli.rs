use crate::crypto::default_provider;
use crate::entity::ZkPkiCertificate;
use crate::error::{Error, Result};
use crate::model::{IssueRequest, ZkPkiModel};
use crate::storage::{FileStorage, StorageOptions};
use crate::types::{ExtendedKeyUsage, KeyAlgorithm, KeySpec, KeyUsages, SubjectAltName};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "zkpki")]
#[command(version, about = "A minimal certificate authority with encrypted storage", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "ZKPKI_STORE_PATH",
        default_value = ".",
        help = "Directory holding the encrypted model snapshot"
    )]
    pub store_path: PathBuf,

    #[arg(
        long,
        global = true,
        env = "ZKPKI_STORE_KEY",
        hide_env_values = true,
        help = "32 byte key that addresses and encrypts the snapshot"
    )]
    pub store_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create a new root CA, replacing any existing one")]
    Init {
        #[arg(short, long, help = "Distinguished name, e.g. CN=Root,O=org,C=US")]
        dn: String,

        #[arg(
            short,
            long,
            default_value = "RSASSA-PKCS1-v1_5",
            help = "Key algorithm: RSASSA-PKCS1-v1_5, RSA-PSS or ECDSA"
        )]
        algorithm: String,

        #[arg(short, long, help = "RSA modulus length or ECDSA curve name")]
        size: Option<String>,

        #[arg(long, help = "Overwrite an initialized model")]
        force: bool,
    },

    #[command(about = "Issue a certificate under the root CA")]
    Issue {
        #[arg(short, long, help = "Subject distinguished name")]
        dn: Option<String>,

        #[arg(short, long, default_value = "365", help = "Lifetime in days")]
        lifetime: u32,

        #[arg(short, long, help = "Key algorithm (defaults to the root CA's)")]
        algorithm: Option<String>,

        #[arg(short, long, help = "RSA modulus length or ECDSA curve name")]
        size: Option<String>,

        #[arg(long, help = "Comma separated key usages, e.g. DigitalSignature,KeyEncipherment")]
        key_usage: Option<String>,

        #[arg(long, help = "Mark key usage critical")]
        key_usage_critical: bool,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Extended key usages by name or OID"
        )]
        eku: Vec<String>,

        #[arg(long, value_delimiter = ',', help = "DNS Subject Alternative Names")]
        dns: Vec<String>,

        #[arg(long, value_delimiter = ',', help = "IP Subject Alternative Names")]
        ip: Vec<String>,

        #[arg(long, help = "Issue a CA certificate")]
        ca: bool,

        #[arg(long, requires = "ca", help = "Path length constraint for a CA")]
        path_length: Option<u32>,

        #[arg(long, conflicts_with = "dn", help = "Read the request from a JSON file")]
        request: Option<PathBuf>,
    },

    #[command(about = "List certificates, or show one in detail")]
    Show {
        #[arg(short, long, help = "Serial number (hex); the root CA when omitted")]
        serial: Option<String>,

        #[arg(long, help = "List every certificate")]
        all: bool,
    },

    #[command(about = "Write a certificate and its key as PEM files")]
    Export {
        #[arg(short, long, help = "Serial number (hex); the root CA when omitted")]
        serial: Option<String>,

        #[arg(long, default_value = "cert.pem", help = "Certificate output path")]
        cert_out: PathBuf,

        #[arg(long, help = "Private key output path")]
        key_out: Option<PathBuf>,
    },
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zkpki=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let key = cli
        .store_key
        .ok_or_else(|| Error::validation("storeKey", "pass --store-key or set ZKPKI_STORE_KEY"))?;
    fs::create_dir_all(&cli.store_path)?;
    let provider = default_provider();
    let storage = FileStorage::new(provider.clone(), StorageOptions::new(&cli.store_path));
    let blob = storage.open_or_create(&key)?;

    let snapshot = blob.get()?;
    let mut model = if snapshot.is_empty() {
        ZkPkiModel::new(provider)
    } else {
        let json = String::from_utf8(snapshot)
            .map_err(|e| Error::Serialization(format!("snapshot is not UTF-8: {}", e)))?;
        ZkPkiModel::from_json(provider, &json)?
    };

    match cli.command {
        Commands::Init {
            dn,
            algorithm,
            size,
            force,
        } => {
            if model.is_initialized() && !force {
                return Err(Error::AlreadyExists(
                    "root CA (use --force to replace it)".to_string(),
                ));
            }
            let algorithm: KeyAlgorithm = algorithm.parse()?;
            let spec = KeySpec::from_parts(algorithm, size.as_deref())?;
            let root = model.initialize(&dn, &spec)?;

            println!("{}", "Root CA created successfully!".green().bold());
            print_summary(root)?;
            blob.set(model.serialize()?.as_bytes())?;
        }

        Commands::Issue {
            dn,
            lifetime,
            algorithm,
            size,
            key_usage,
            key_usage_critical,
            eku,
            dns,
            ip,
            ca,
            path_length,
            request,
        } => {
            let request = match request {
                Some(path) => serde_json::from_str::<IssueRequest>(&fs::read_to_string(path)?)?,
                None => {
                    let dn = dn.ok_or_else(|| {
                        Error::validation("subjectDn", "pass --dn or --request")
                    })?;
                    let mut request = IssueRequest::new(dn, lifetime);
                    request.key_algorithm =
                        algorithm.map(|a| a.parse::<KeyAlgorithm>()).transpose()?;
                    request.key_size_or_curve = size;
                    request.key_usages = match key_usage {
                        Some(list) => KeyUsages::parse_list(&list)?,
                        None => KeyUsages::NONE,
                    };
                    request.key_usages_critical = key_usage_critical;
                    request.extended_key_usages = eku
                        .iter()
                        .map(|e| e.parse::<ExtendedKeyUsage>())
                        .collect::<Result<Vec<_>>>()?;
                    request.subject_alternative_names = dns
                        .into_iter()
                        .map(SubjectAltName::Dns)
                        .chain(ip.into_iter().map(SubjectAltName::Ip))
                        .collect();
                    request.is_ca = ca;
                    request.path_length = path_length;
                    request
                }
            };

            let issued = model.issue_certificate(&request)?;
            println!("{}", "Certificate issued successfully!".green().bold());
            print_summary(issued)?;
            blob.set(model.serialize()?.as_bytes())?;
        }

        Commands::Show { serial, all } => {
            if all {
                let root = model.root_ca().ok_or(Error::Uninitialized)?;
                println!("{}", "Root CA".bold().cyan());
                print_summary(root)?;
                for cert in model.certificates() {
                    println!("{}", "=".repeat(60));
                    print_summary(cert)?;
                }
            } else {
                print_details(find(&model, serial.as_deref())?)?;
            }
        }

        Commands::Export {
            serial,
            cert_out,
            key_out,
        } => {
            let cert = find(&model, serial.as_deref())?;
            cert.save_pem(&cert_out, key_out.as_ref())?;
            println!("{}", "Certificate exported successfully!".green().bold());
            println!("  {}: {}", "Certificate".cyan(), cert_out.display());
            if let Some(path) = key_out {
                println!("  {}: {}", "Private Key".cyan(), path.display());
            }
        }
    }

    Ok(())
}

fn find<'a>(model: &'a ZkPkiModel, serial: Option<&str>) -> Result<&'a ZkPkiCertificate> {
    let root = model.root_ca().ok_or(Error::Uninitialized)?;
    let Some(serial) = serial else {
        return Ok(root);
    };
    let wanted = serial.trim_start_matches("0x").trim_start_matches('0').to_ascii_lowercase();
    std::iter::once(root)
        .chain(model.certificates())
        .find(|c| c.serial_number() == wanted)
        .ok_or_else(|| Error::NotFound(format!("certificate with serial {}", serial)))
}

fn print_summary(cert: &ZkPkiCertificate) -> Result<()> {
    println!("  {}: {}", "Serial".cyan(), cert.serial_number());
    println!("  {}: {}", "Subject".cyan(), cert.subject()?);
    println!("  {}: {}", "Issuer".cyan(), cert.issuer()?);
    println!(
        "  {}: {} to {}",
        "Validity".cyan(),
        cert.not_before().format("%Y-%m-%d"),
        cert.not_after().format("%Y-%m-%d")
    );
    Ok(())
}

fn print_details(cert: &ZkPkiCertificate) -> Result<()> {
    print_summary(cert)?;
    let key = match cert.elliptic_curve_name() {
        Some(curve) => curve.to_string(),
        None => format!("{} bits", cert.public_key_size()),
    };
    println!(
        "  {}: {} ({})",
        "Public Key".cyan(),
        cert.public_key_algorithm()?,
        key
    );
    println!("  {}: {}", "CA".cyan(), cert.is_ca());
    if let Some(len) = cert.path_length() {
        println!("  {}: {}", "Path Length".cyan(), len);
    }
    if !cert.key_usages().is_empty() {
        println!(
            "  {}: {}{}",
            "Key Usage".cyan(),
            cert.key_usages().names().join(", "),
            if cert.key_usages_critical() { " (critical)" } else { "" }
        );
    }
    let ekus = cert.extended_key_usages();
    if !ekus.is_empty() {
        let names: Vec<_> = ekus.iter().map(|e| e.name()).collect();
        println!(
            "  {}: {}{}",
            "Extended Key Usage".cyan(),
            names.join(", "),
            if cert.extended_key_usages_critical() { " (critical)" } else { "" }
        );
    }
    if !cert.subject_alternative_names().is_empty() {
        let sans: Vec<_> = cert
            .subject_alternative_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        println!("  {}: {}", "Alt Names".cyan(), sans.join(", "));
    }
    println!("  {}: {}", "Private Key".cyan(), cert.has_private_key());
    Ok(())
}
