use chan::Sender;
use hyper::status::StatusCode;
use std::cell::RefCell;

use datatype::Error;
use http::{Client, Request, Response, ResponseData};


/// Returns canned HTTP responses from a pre-loaded list, popped in
/// reverse order (grounded on the client's own `TestClient`).
pub struct TestClient<T> {
    responses: RefCell<Vec<T>>,
}

impl<T> Default for TestClient<T> {
    fn default() -> Self {
        TestClient { responses: RefCell::new(Vec::new()) }
    }
}

impl<T> TestClient<T> {
    pub fn from(responses: Vec<T>) -> TestClient<T> {
        TestClient { responses: RefCell::new(responses) }
    }
}

impl Client for TestClient<String> {
    fn chan_request(&self, req: Request, resp_tx: Sender<Response>) {
        let response = match self.responses.borrow_mut().pop() {
            Some(body) => Response::Success(ResponseData { code: StatusCode::Ok, body: body.into_bytes() }),
            None => Response::Error(Error::Client(req.url.to_string())),
        };
        resp_tx.send(response);
    }

    fn is_testing(&self) -> bool { true }
}

impl Client for TestClient<Vec<u8>> {
    fn chan_request(&self, req: Request, resp_tx: Sender<Response>) {
        let response = match self.responses.borrow_mut().pop() {
            Some(body) => Response::Success(ResponseData { code: StatusCode::Ok, body: body }),
            None => Response::Error(Error::Client(req.url.to_string())),
        };
        resp_tx.send(response);
    }

    fn is_testing(&self) -> bool { true }
}
