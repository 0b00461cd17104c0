//! Registry connection: TLS socket plus EPP framing.
//!
//! A [`Transport`] carries exactly one exchange at a time. [`FramedStream`]
//! does the framing over any async stream; [`TlsTransport`] opens the TLS
//! connection and owns the framed stream.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use eppd_core::RegistryConfig;
use eppd_protocol::{FrameBuffer, FrameCodec};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

use crate::error::{TransportError, TransportResult};

/// Boxed future returned by [`Transport`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const READ_CHUNK: usize = 4096;

/// Result of [`Transport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connected {
    /// A new connection; carries the server's greeting frame.
    Established { greeting: Vec<u8> },
    AlreadyConnected,
}

/// A connection to a registry that exchanges one frame for one frame.
pub trait Transport: Send {
    /// Opens the connection if it is not open yet.
    fn connect(&mut self) -> BoxFuture<'_, TransportResult<Connected>>;

    /// Sends one document and returns the response document.
    ///
    /// Fails with [`TransportError::RequestInFlight`] if an earlier exchange
    /// was abandoned before its response arrived.
    fn send<'a>(&'a mut self, payload: &'a [u8]) -> BoxFuture<'a, TransportResult<Vec<u8>>>;

    fn is_connected(&self) -> bool;
}

/// EPP framing over an async byte stream.
pub struct FramedStream<S> {
    stream: S,
    codec: FrameCodec,
    buffer: FrameBuffer,
    in_flight: bool,
    broken: bool,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, codec: FrameCodec) -> Self {
        Self {
            stream,
            codec,
            buffer: FrameBuffer::new(),
            in_flight: false,
            broken: false,
        }
    }

    /// Reads until one complete frame is buffered; bytes past it are kept.
    pub async fn read_frame(&mut self) -> TransportResult<Vec<u8>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self
                .buffer
                .try_take(&self.codec)
                .map_err(TransportError::Corrupt)?
            {
                return Ok(frame);
            }
            let read = self.stream.read(&mut chunk).await?;
            if read == 0 {
                return Err(TransportError::PeerClosed);
            }
            self.buffer.extend(&chunk[..read]);
        }
    }

    /// Writes one frame and waits for the next one.
    ///
    /// The in-flight flag is cleared when the exchange completes or fails. If
    /// the future is dropped mid-exchange the flag stays set, so the stream
    /// refuses further exchanges instead of reading a stale response.
    ///
    /// After a fatal error the buffered bytes are discarded and every later
    /// exchange fails with [`TransportError::NotConnected`] without writing.
    pub async fn exchange(&mut self, payload: &[u8]) -> TransportResult<Vec<u8>> {
        if self.broken {
            return Err(TransportError::NotConnected);
        }
        if self.in_flight {
            return Err(TransportError::RequestInFlight);
        }
        let frame = self.codec.encode(payload)?;

        self.in_flight = true;
        let result = self.round_trip(&frame).await;
        self.in_flight = false;
        if let Err(e) = &result
            && e.is_fatal()
        {
            self.broken = true;
            self.buffer.clear();
        }
        result
    }

    async fn round_trip(&mut self, frame: &[u8]) -> TransportResult<Vec<u8>> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        self.read_frame().await
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

/// TLS connection to a registry.
pub struct TlsTransport {
    host: String,
    port: u16,
    connector: TlsConnector,
    codec: FrameCodec,
    stream: Option<FramedStream<TlsStream<TcpStream>>>,
}

impl fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsTransport")
            .field("address", &self.address())
            .field("codec", &self.codec)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

impl TlsTransport {
    /// Prepares the TLS client configuration; no connection is made yet.
    pub fn new(config: &RegistryConfig) -> TransportResult<Self> {
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            connector: TlsConnector::from(Arc::new(client_config(config)?)),
            codec: FrameCodec::from(config.framing),
            stream: None,
        })
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn establish(&mut self) -> TransportResult<Connected> {
        if self.stream.is_some() {
            return Ok(Connected::AlreadyConnected);
        }

        let address = self.address();
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| TransportError::Connect {
                address: address.clone(),
                source,
            })?;
        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|e| TransportError::tls(format!("invalid server name {}: {}", self.host, e)))?;
        let tls = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| TransportError::tls(format!("handshake with {} failed: {}", address, e)))?;

        let mut stream = FramedStream::new(tls, self.codec);
        let greeting = stream.read_frame().await?;
        info!(address = %address, "Established registry connection");

        self.stream = Some(stream);
        Ok(Connected::Established { greeting })
    }

    async fn exchange(&mut self, payload: &[u8]) -> TransportResult<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let result = stream.exchange(payload).await;
        if let Err(e) = &result
            && e.is_fatal()
        {
            warn!(address = %self.address(), error = %e, "Registry connection lost");
            self.stream = None;
        }
        result
    }
}

impl Transport for TlsTransport {
    fn connect(&mut self) -> BoxFuture<'_, TransportResult<Connected>> {
        Box::pin(self.establish())
    }

    fn send<'a>(&'a mut self, payload: &'a [u8]) -> BoxFuture<'a, TransportResult<Vec<u8>>> {
        Box::pin(self.exchange(payload))
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

fn read_pem(path: &Path, what: &str) -> TransportResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| TransportError::tls(format!("failed to read {} {}: {}", what, path.display(), e)))
}

fn parse_certificates(pem: &[u8], what: &str) -> TransportResult<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::tls(format!("failed to parse {}: {}", what, e)))?;
    if certs.is_empty() {
        return Err(TransportError::tls(format!("no certificates found in {}", what)));
    }
    Ok(certs)
}

/// Builds the rustls client configuration for a registry.
///
/// `ca` selects the trust roots. Without it the server certificate is not
/// checked, only the handshake signatures are.
pub fn client_config(config: &RegistryConfig) -> TransportResult<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::tls(e.to_string()))?;

    let builder = match &config.ca {
        Some(path) => {
            let mut roots = RootCertStore::empty();
            for cert in parse_certificates(&read_pem(path, "CA bundle")?, "CA bundle")? {
                roots
                    .add(cert)
                    .map_err(|e| TransportError::tls(format!("failed to add CA certificate: {}", e)))?;
            }
            builder.with_root_certificates(roots)
        }
        None => {
            warn!(
                host = %config.host,
                "No CA bundle configured, registry certificate will not be verified"
            );
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        }
    };

    match (&config.cert, &config.key) {
        (Some(cert), Some(key)) => {
            let chain = parse_certificates(&read_pem(cert, "certificate")?, "client certificate")?;
            let key = PrivateKeyDer::from_pem_slice(&read_pem(key, "private key")?)
                .map_err(|e| TransportError::tls(format!("failed to parse private key: {}", e)))?;
            debug!(host = %config.host, "Using client certificate");
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| TransportError::tls(format!("client certificate rejected: {}", e)))
        }
        _ => Ok(builder.with_no_client_auth()),
    }
}

/// Accepts any server certificate while still checking handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
