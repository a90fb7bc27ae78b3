pub mod deepseek;
pub mod transport;

pub use deepseek::{ChatResponse, DeepSeekClient, DEFAULT_API_URL};
pub use transport::{HttpTransport, Transport, TransportResponse};
