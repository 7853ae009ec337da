use chan::{self, Receiver, Sender};
use hyper::client::{Body, Client as HyperClient};
use hyper::header::{Connection, ContentLength, ContentType};
use hyper::method::Method as HyperMethod;
use hyper::mime::{Mime, TopLevel, SubLevel};
use hyper::net::HttpsConnector;
use hyper::status::StatusCode;
use std::fmt::{self, Display, Formatter};
use std::io::Read;
use url::Url;

use datatype::Error;
use http::tls::TlsClient;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl From<Method> for HyperMethod {
    fn from(m: Method) -> HyperMethod {
        match m {
            Method::Get  => HyperMethod::Get,
            Method::Post => HyperMethod::Post,
            Method::Put  => HyperMethod::Put,
        }
    }
}


/// A transport-agnostic outgoing request, shared by `fetcher` and the
/// `IpUptane` secondary transport.
#[derive(Clone, Debug)]
pub struct Request {
    pub url:    Url,
    pub method: Method,
    pub body:   Option<Vec<u8>>,
}

impl Request {
    pub fn get(url: Url) -> Request {
        Request { url: url, method: Method::Get, body: None }
    }

    pub fn post(url: Url, body: Option<Vec<u8>>) -> Request {
        Request { url: url, method: Method::Post, body: body }
    }
}

/// A successful response's status code and raw body.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseData {
    pub code: StatusCode,
    pub body: Vec<u8>,
}

impl Display for ResponseData {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, String::from_utf8_lossy(&self.body))
    }
}

#[derive(Debug)]
pub enum Response {
    Success(ResponseData),
    Failed(ResponseData),
    Error(Error),
}


/// Every HTTP-capable transport implements this; `fetcher` and the
/// `IpUptane` secondary are generic over it so tests can substitute
/// `TestClient` (spec section 6).
pub trait Client: Send + Sync {
    fn chan_request(&self, req: Request, resp_tx: Sender<Response>);

    fn is_testing(&self) -> bool { false }

    fn send(&self, req: Request) -> Receiver<Response> {
        let (tx, rx) = chan::sync(0);
        self.chan_request(req, tx);
        rx
    }

    fn get(&self, url: Url, body: Option<Vec<u8>>) -> Receiver<Response> {
        self.send(Request { url: url, method: Method::Get, body: body })
    }

    fn post(&self, url: Url, body: Option<Vec<u8>>) -> Receiver<Response> {
        self.send(Request { url: url, method: Method::Post, body: body })
    }

    fn put(&self, url: Url, body: Option<Vec<u8>>) -> Receiver<Response> {
        self.send(Request { url: url, method: Method::Put, body: body })
    }
}


/// A plain Hyper-backed HTTPS client. No OAuth: Director/Image repository
/// endpoints authenticate via the device's mutual-TLS client certificate,
/// set once by the key manager through `init_tls_client`.
pub struct HttpClient {
    client: HyperClient,
}

impl Default for HttpClient {
    fn default() -> Self {
        let mut client = HyperClient::with_connector(HttpsConnector::new(TlsClient::new()));
        client.set_redirect_policy(::hyper::client::RedirectPolicy::FollowNone);
        HttpClient { client: client }
    }
}

impl Client for HttpClient {
    fn chan_request(&self, req: Request, resp_tx: Sender<Response>) {
        resp_tx.send(self.send_sync(req));
    }
}

impl HttpClient {
    fn send_sync(&self, req: Request) -> Response {
        let mime_json = Mime(TopLevel::Application, SubLevel::Json, vec![]);
        let mut builder = self.client.request(req.method.into(), req.url.clone())
            .header(Connection::close())
            .header(ContentType(mime_json))
            .header(ContentLength(req.body.as_ref().map_or(0, |b| b.len() as u64)));

        if let Some(ref body) = req.body {
            builder = builder.body(Body::BufBody(body, body.len()));
        }

        match builder.send() {
            Ok(mut resp) => {
                let mut body = Vec::new();
                if let Err(err) = resp.read_to_end(&mut body) {
                    return Response::Error(Error::Client(format!("couldn't read response body: {}", err)));
                }
                let data = ResponseData { code: resp.status, body: body };
                if resp.status.is_success() {
                    Response::Success(data)
                } else if resp.status == StatusCode::Unauthorized || resp.status == StatusCode::Forbidden {
                    Response::Error(Error::HttpAuth(data))
                } else {
                    Response::Failed(data)
                }
            }
            Err(err) => Response::Error(Error::Client(format!("couldn't send request: {}", err))),
        }
    }
}
