pub mod http_client;
pub mod test_client;
pub mod tls;

pub use self::http_client::{Client, HttpClient, Method, Request, Response, ResponseData};
pub use self::test_client::TestClient;
pub use self::tls::{TlsClient, TlsData, init_tls_client, use_default_certificates};
