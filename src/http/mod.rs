//! HTTP 传输层：客户端抽象、reqwest 实现、测试用 Mock，以及 Invoke 可调用的函数注册表

pub mod client;
pub mod functions;
pub mod mock;

pub use client::{HttpClient, HttpError, HttpResponse, Method, ReqwestClient};
pub use functions::{Function, FunctionRegistry, HttpGet};
pub use mock::{MockHttpClient, MockReply};
