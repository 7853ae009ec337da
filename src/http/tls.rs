use hyper::error::{Error as HyperError, Result as HyperResult};
use hyper::net::{HttpStream, NetworkStream, SslClient};
use openssl::pkey::PKey;
use openssl::ssl::{Error as SslError, SslConnectorBuilder, SslConnector,
                   SslMethod, SslStream, ShutdownResult};
use openssl::x509::X509;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;


lazy_static! {
    static ref CONNECTOR: Mutex<Option<Arc<TlsConnector>>> = Mutex::new(None);
}


/// In-memory PEM-encoded credentials, as produced by the key manager
/// (spec section 4.9) after loading from file or PKCS#11.
pub struct TlsData<'p> {
    pub ca_pem:   Option<&'p [u8]>,
    pub cert_pem: Option<&'p [u8]>,
    pub pkey_pem: Option<&'p [u8]>,
}

impl<'p> Default for TlsData<'p> {
    fn default() -> Self {
        TlsData { ca_pem: None, cert_pem: None, pkey_pem: None }
    }
}

/// This function *must* be called before `TlsClient::new()`. Calling it
/// again atomically replaces the connector used by every subsequent
/// request (spec section 4.9 "Rotation replaces credentials atomically").
pub fn init_tls_client(tls: Option<TlsData>) {
    match tls {
        Some(_) => debug!("using preset TLS credentials"),
        None    => debug!("using default system TLS credentials"),
    }
    *CONNECTOR.lock().unwrap() = Some(Arc::new(TlsConnector::new(tls)));
}

pub fn use_default_certificates() {
    init_tls_client(None);
}


/// TLS client for HTTPS communication.
pub struct TlsClient(Arc<TlsConnector>);

impl TlsClient {
    pub fn new() -> TlsClient {
        match *CONNECTOR.lock().unwrap() {
            Some(ref connector) => TlsClient(connector.clone()),
            None => panic!("init_tls_client not called"),
        }
    }
}

impl SslClient for TlsClient {
    type Stream = TlsStream<HttpStream>;

    fn wrap_client(&self, stream: HttpStream, host: &str) -> HyperResult<Self::Stream> {
        self.0.connect(host, stream)
    }
}

impl Debug for TlsClient {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_tuple("TlsClient").field(&"_").finish()
    }
}


struct TlsConnector(SslConnector);

impl TlsConnector {
    pub fn new(tls: Option<TlsData>) -> TlsConnector {
        let mut builder = SslConnectorBuilder::new(SslMethod::tls())
            .unwrap_or_else(|err| panic!("couldn't create new SslConnectorBuilder: {}", err));

        if let Some(tls) = tls {
            if let Some(ca) = tls.ca_pem {
                let cert = X509::from_pem(ca).unwrap_or_else(|err| panic!("couldn't parse CA pem: {}", err));
                builder.builder_mut().cert_store_mut().add_cert(cert)
                    .unwrap_or_else(|err| panic!("couldn't add CA certificate: {}", err));
            }

            if let (Some(cert_pem), Some(pkey_pem)) = (tls.cert_pem, tls.pkey_pem) {
                let cert = X509::from_pem(cert_pem).unwrap_or_else(|err| panic!("couldn't parse client cert: {}", err));
                let pkey = PKey::private_key_from_pem(pkey_pem).unwrap_or_else(|err| panic!("couldn't parse client key: {}", err));
                let context = builder.builder_mut();
                context.set_certificate(&cert).unwrap_or_else(|err| panic!("couldn't set client certificate: {}", err));
                context.set_private_key(&pkey).unwrap_or_else(|err| panic!("couldn't set private key: {}", err));
                context.check_private_key().unwrap_or_else(|err| panic!("couldn't validate private key: {}", err));
            }
        }

        TlsConnector(builder.build())
    }

    pub fn connect<S>(&self, domain: &str, stream: S) -> Result<TlsStream<S>, HyperError>
        where S: NetworkStream + Send + Sync + Debug
    {
        self.0.connect(domain, stream).map(TlsStream).map_err(|err| HyperError::Ssl(Box::new(err)))
    }
}


pub struct TlsStream<S>(SslStream<S>);

impl<S: Debug> Debug for TlsStream<S> {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        Debug::fmt(&self.0, fmt)
    }
}

impl<S: Read + Write> TlsStream<S> {
    pub fn buffered_read_size(&self) -> Result<usize, ()> {
        Ok(self.0.ssl().pending())
    }

    pub fn shutdown(&mut self) -> io::Result<()> {
        loop {
            match self.0.shutdown() {
                Ok(ShutdownResult::Sent)     => {},
                Ok(ShutdownResult::Received) => break,
                Err(SslError::ZeroReturn)    => break,
                Err(SslError::Stream(e))     => return Err(e),
                Err(SslError::WantRead(e))   => return Err(e),
                Err(SslError::WantWrite(e))  => return Err(e),
                Err(err) => return Err(io::Error::new(io::ErrorKind::Other, err)),
            }
        }

        Ok(())
    }

    pub fn get_ref(&self) -> &S {
        self.0.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut S {
        self.0.get_mut()
    }
}

impl<S: Read + Write> Read for TlsStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<S: Read + Write> Write for TlsStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<S> Clone for TlsStream<S> {
    fn clone(&self) -> TlsStream<S> {
        unreachable!("TlsStream::clone not used")
    }
}

impl<S: NetworkStream> NetworkStream for TlsStream<S> {
    fn peer_addr(&mut self) -> io::Result<SocketAddr> {
        self.0.get_mut().peer_addr()
    }

    fn set_read_timeout(&self, duration: Option<Duration>) -> io::Result<()> {
        self.0.get_ref().set_read_timeout(duration)
    }

    fn set_write_timeout(&self, duration: Option<Duration>) -> io::Result<()> {
        self.0.get_ref().set_write_timeout(duration)
    }
}
