use crate::application_port::AuthError;
use crate::domain_port::ResetNotifier;
use crate::logger::*;

/// Development delivery: writes the raw reset token to the log instead of
/// sending mail. Logged at debug so release filters keep it out.
#[derive(Debug, Default)]
pub struct LogResetNotifier;

#[async_trait::async_trait]
impl ResetNotifier for LogResetNotifier {
    async fn deliver(&self, email: &str, reset_token: &str) -> Result<(), AuthError> {
        debug!(%email, %reset_token, "reset token issued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::filter::LevelFilter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    async fn output_at(level: LevelFilter) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let guard = tracing::subscriber::set_default(subscriber);
        LogResetNotifier
            .deliver("alice@example.com", "tok-1234")
            .await
            .unwrap();
        drop(guard);

        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn token_only_reaches_debug_output() {
        assert!(!output_at(LevelFilter::INFO).await.contains("tok-1234"));
        assert!(output_at(LevelFilter::DEBUG).await.contains("tok-1234"));
    }
}
