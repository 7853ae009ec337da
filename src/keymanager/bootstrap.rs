//! One-shot device provisioning: exchange a shared credential for a
//! PKCS#12 bundle (spec section 4.9, section 7 Config `[provision]`),
//! grounded on the client's own `authenticate::pkcs12` and `http/tls.rs`
//! PKCS#12 parsing.

use openssl::pkcs12::Pkcs12;

use datatype::{Error, ProvisionConfig};
use http::{Client, Response};
use keymanager::KeyManager;

/// `POST` the provisioning endpoint with the shared credential, returning
/// the raw DER-encoded PKCS#12 archive issued for this device.
pub fn fetch_p12<C: Client>(config: &ProvisionConfig, client: &C) -> Result<Vec<u8>, Error> {
    let base: ::url::Url = config.server.parse().map_err(Error::from)?;
    let url = base.join(&config.provision_path).map_err(Error::from)?;
    let body = format!("{{\"deviceId\":\"{}\",\"ttl\":{}}}", config.device_id, config.expiry_days);
    match client.post(url, Some(body.into_bytes())).recv() {
        Some(Response::Success(data)) => Ok(data.body),
        Some(Response::Failed(data))  => Err(Error::Client(format!("provisioning returned {}", data.code))),
        Some(Response::Error(err))    => Err(err),
        None => Err(Error::Client("no response from provisioning server".into())),
    }
}

/// Decode a PKCS#12 archive into its three PEM-encoded parts.
pub fn parse_p12(der: &[u8], password: &str) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), Error> {
    let pkcs12 = Pkcs12::from_der(der).map_err(|err| Error::Pkcs12(err.to_string()))?;
    let parsed = pkcs12.parse(password).map_err(|err| Error::Pkcs12(err.to_string()))?;
    let ca_pem = parsed.chain.map(|chain| {
        chain.into_iter().flat_map(|cert| cert.to_pem().unwrap_or_default()).collect()
    }).unwrap_or_default();
    let cert_pem = parsed.cert.to_pem().map_err(|err| Error::Pkcs12(err.to_string()))?;
    let pkey_pem = parsed.pkey.private_key_to_pem().map_err(|err| Error::Pkcs12(err.to_string()))?;
    Ok((ca_pem, cert_pem, pkey_pem))
}

/// Fetch, decode and install a fresh PKCS#12 bundle into the key manager
/// (spec section 4.9 "rotation replaces credentials atomically").
pub fn provision<C: Client>(config: &ProvisionConfig, client: &C, keys: &KeyManager) -> Result<(), Error> {
    let der = fetch_p12(config, client)?;
    let (ca_pem, cert_pem, pkey_pem) = parse_p12(&der, &config.p12_password)?;
    keys.rotate_tls(ca_pem, cert_pem, pkey_pem);
    Ok(())
}
