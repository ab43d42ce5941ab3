use zkpki::crypto::default_provider;
use zkpki::types::{EllipticCurve, ExtendedKeyUsage, KeySpec, KeyUsage, SubjectAltName};
use zkpki::{FileStorage, IssueRequest, StorageOptions, ZkPkiModel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Initializing a model with a P-256 root CA...");

    let mut model = ZkPkiModel::new(default_provider());
    let root = model.initialize(
        "CN=Example Root CA,OU=IT Security,O=Example Organization,L=San Francisco,ST=California,C=US",
        &KeySpec::ecdsa(EllipticCurve::P256),
    )?;
    root.save_pem("example-ca.pem", Some("example-ca-key.pem"))?;
    println!("Root CA {} created and saved!", root.serial_number());

    println!("\nIssuing a server certificate...");

    let mut server = IssueRequest::new("CN=example.com,O=Example Organization", 365);
    server.key_usages = KeyUsage::DigitalSignature | KeyUsage::KeyEncipherment;
    server.key_usages_critical = true;
    server.extended_key_usages = vec![ExtendedKeyUsage::ServerAuthentication];
    server.subject_alternative_names = vec![
        SubjectAltName::Dns("example.com".into()),
        SubjectAltName::Dns("www.example.com".into()),
        SubjectAltName::Ip("192.0.2.10".into()),
    ];
    let server_cert = model.issue_certificate(&server)?;
    server_cert.save_pem("server.pem", Some("server-key.pem"))?;
    println!("Server certificate {} issued!", server_cert.serial_number());

    println!("\nIssuing an RSA client certificate...");

    let mut client = IssueRequest::new("CN=Alice Smith,O=Example Organization", 365);
    client.key_algorithm = Some(zkpki::KeyAlgorithm::RsaSsaPkcs1V1_5);
    client.key_usages = KeyUsage::DigitalSignature.into();
    client.extended_key_usages = vec![
        ExtendedKeyUsage::ClientAuthentication,
        ExtendedKeyUsage::EmailProtection,
    ];
    let client_cert = model.issue_certificate(&client)?;
    client_cert.save_pem("client.pem", Some("client-key.pem"))?;
    println!("Client certificate {} issued!", client_cert.serial_number());

    println!("\nStoring the model snapshot encrypted...");
    let storage = FileStorage::new(default_provider(), StorageOptions::new("."));
    let key = "Ohneo4ahthahSeG9AeT0thai4Moineex";
    let blob = storage.open_or_create(key)?;
    blob.set(model.serialize()?.as_bytes())?;

    println!("\nAll certificates created successfully!");
    println!("Files created:");
    println!("  - example-ca.pem (Root CA certificate)");
    println!("  - example-ca-key.pem (Root CA private key)");
    println!("  - server.pem (Server certificate)");
    println!("  - server-key.pem (Server private key)");
    println!("  - client.pem (Client certificate)");
    println!("  - client-key.pem (Client private key)");
    println!("  - {} (encrypted model snapshot)", blob.filename().display());

    Ok(())
}
