//! HTTPS 证书：读取配置的 PEM 文件，或生成自签名证书。

use axum_server::tls_rustls::RustlsConfig;
use rcgen::generate_simple_self_signed;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::config::Args;

pub async fn build_rustls_config(args: &Args, host: IpAddr) -> Result<RustlsConfig, std::io::Error> {
    let (cert_path, key_path) = match (&args.tls_cert, &args.tls_key) {
        (Some(cert), Some(key)) => (PathBuf::from(cert), PathBuf::from(key)),
        (Some(_), None) | (None, Some(_)) => {
            warn!("both tls cert and key are required, falling back to self-signed");
            write_self_signed(host)?
        }
        (None, None) => write_self_signed(host)?,
    };

    let cert = fs::read(&cert_path).await?;
    let key = fs::read(&key_path).await?;
    RustlsConfig::from_pem(cert, key).await
}

fn write_self_signed(host: IpAddr) -> Result<(PathBuf, PathBuf), std::io::Error> {
    let mut names = vec![host.to_string()];
    if host.is_unspecified() || host.is_loopback() {
        names.push("localhost".into());
    }
    let cert = generate_simple_self_signed(names).map_err(|err| std::io::Error::other(err.to_string()))?;
    let dir = std::env::temp_dir();
    let cert_path = dir.join("bdpa-drive-cert.pem");
    let key_path = dir.join("bdpa-drive-key.pem");
    std::fs::write(&cert_path, cert.cert.pem())?;
    std::fs::write(&key_path, cert.key_pair.serialize_pem())?;
    info!(cert = ?cert_path, "generated self-signed certificate");
    Ok((cert_path, key_path))
}
