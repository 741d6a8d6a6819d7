//! Session orchestrator.
//!
//! One call to [`RequestProcessor::process_requests`] runs a complete
//! session over a fresh connection:
//!
//! ```text
//! Opening -> Negotiating -> Establishing -> Sending -> AwaitingResponse -> Dispatching
//! ```
//!
//! Whatever the outcome, the connection streams are closed exactly once
//! before the call returns.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CvsError, Result};
use crate::protocol::{
    DefaultResponseParser, Request, Requests, ResponseHandler, ResponseParser, TransmitKind,
};
use crate::session::control::{Platform, ProgressHandler};
use crate::session::environment::ClientEnvironment;
use crate::session::error_defending::ErrorDefendingResponseHandler;
use crate::session::valid_requests::{ValidRequests, ValidRequestsCollector};
use crate::streaming::{Charset, ConnectionStreams};
use crate::transport::ConnectionFactory;

pub struct RequestProcessor {
    factory: Box<dyn ConnectionFactory>,
    environment: ClientEnvironment,
    parser: Arc<dyn ResponseParser>,
    platform: Platform,
}

impl RequestProcessor {
    pub fn new(factory: impl ConnectionFactory + 'static, environment: ClientEnvironment) -> Self {
        Self {
            factory: Box::new(factory),
            environment,
            parser: Arc::new(DefaultResponseParser),
            platform: Platform::current(),
        }
    }

    pub fn with_parser(mut self, parser: impl ResponseParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn environment(&self) -> &ClientEnvironment {
        &self.environment
    }

    /// Run one session: send `requests`, dispatch the replies to `handler`.
    ///
    /// Returns the server's verdict (`ok` is `true`, `error` or a stream that
    /// ends without either is `false`).
    pub fn process_requests(
        &self,
        requests: &Requests,
        handler: &mut dyn ResponseHandler,
        progress: &mut dyn ProgressHandler,
    ) -> Result<bool> {
        // Opening
        let mut connection = self.factory.create()?;
        connection.open(self.environment.logger.as_ref())?;
        let repository = connection.repository().to_string();
        debug!(repository = %repository, "Connection opened");

        let mut streams =
            ConnectionStreams::open(connection, self.environment.logger.clone(), Charset::Ascii)?;
        let result = self.run_session(&mut streams, &repository, requests, handler, progress);
        streams.close();

        match &result {
            Ok(success) => debug!(success, "Session finished"),
            Err(e) => debug!("Session failed: {}", e),
        }
        result
    }

    fn run_session(
        &self,
        streams: &mut ConnectionStreams,
        repository: &str,
        requests: &Requests,
        handler: &mut dyn ResponseHandler,
        progress: &mut dyn ProgressHandler,
    ) -> Result<bool> {
        let valid_requests = self.negotiate(streams)?;
        progress.valid_requests_received(valid_requests.names());

        self.establish(streams, repository, &valid_requests)?;
        self.send_requests(streams, requests, progress)?;

        // AwaitingResponse
        let terminal = requests.response_expecting();
        debug!(command = terminal.name(), "Sending response-expecting request");
        self.write_request(streams, terminal)?;
        streams.flush_for_reading()?;

        self.dispatch(streams, handler)
    }

    // =========================================================================
    // Negotiating
    // =========================================================================

    fn negotiate(&self, streams: &mut ConnectionStreams) -> Result<ValidRequests> {
        debug!("Negotiating valid requests");
        self.write_request(streams, &Request::ValidRequests)?;
        streams.flush_for_reading()?;

        let mut collector = ValidRequestsCollector::default();
        loop {
            self.check_aborted()?;
            if self.next_response(streams, &mut collector)?.is_some() {
                break;
            }
        }

        for error in collector.errors() {
            warn!("Server: {}", error);
        }
        let valid_requests = collector.into_valid_requests();
        if valid_requests.is_empty() {
            return Err(CvsError::ValidRequestsExpected);
        }
        debug!(count = valid_requests.len(), "Server advertised valid requests");
        Ok(valid_requests)
    }

    // =========================================================================
    // Establishing
    // =========================================================================

    fn establish(
        &self,
        streams: &mut ConnectionStreams,
        repository: &str,
        valid_requests: &ValidRequests,
    ) -> Result<()> {
        let config = &self.environment.config;

        self.write_request(streams, &Request::Root(repository.to_string()))?;

        for (name, value) in &config.environment {
            self.write_request(
                streams,
                &Request::Set {
                    name: name.clone(),
                    value: value.clone(),
                },
            )?;
        }

        if let Some(level) = config.gzip_level {
            let gzip = Request::GzipStream(level);
            if valid_requests.supports(gzip.name()) {
                self.write_request(streams, &gzip)?;
                streams.set_gzipped(level)?;
            } else {
                warn!("Server does not support {}, continuing uncompressed", gzip.name());
            }
        }

        if config.charset.is_utf8() {
            streams.set_utf8();
        }

        self.write_request(streams, &Request::ValidResponses)?;
        self.write_request(streams, &Request::UseUnchanged)?;

        let options = config.global_options();
        if !options.is_empty() {
            if valid_requests.supports(Request::GlobalOption("").name()) {
                for switch in options.switches() {
                    self.write_request(streams, &Request::GlobalOption(switch))?;
                }
            } else {
                warn!("Server does not support global options, ignoring them");
            }
        }

        if self.platform.case_insensitive && valid_requests.supports(Request::Case.name()) {
            self.write_request(streams, &Request::Case)?;
        }

        Ok(())
    }

    // =========================================================================
    // Sending
    // =========================================================================

    fn send_requests(
        &self,
        streams: &mut ConnectionStreams,
        requests: &Requests,
        progress: &mut dyn ProgressHandler,
    ) -> Result<()> {
        debug!(count = requests.len(), "Sending requests");
        for request in requests.requests() {
            self.check_aborted()?;
            self.write_request(streams, request)?;

            if let Some(payload) = request.file_payload() {
                let path = self.environment.resolve(&payload.path);
                let reader = &self.environment.file_reader;
                match payload.kind {
                    TransmitKind::Text => reader.transmit_text_file(&path, streams)?,
                    TransmitKind::Binary => reader.transmit_binary_file(&path, streams)?,
                }
            }
            progress.request_sent(request);
        }
        Ok(())
    }

    fn write_request(&self, streams: &mut ConnectionStreams, request: &Request) -> Result<()> {
        request.validate()?;
        streams.writer().write_line(&request.line())?;
        Ok(())
    }

    // =========================================================================
    // Dispatching
    // =========================================================================

    fn dispatch(
        &self,
        streams: &mut ConnectionStreams,
        handler: &mut dyn ResponseHandler,
    ) -> Result<bool> {
        let mut defending =
            ErrorDefendingResponseHandler::new(handler, self.environment.config.error_timeout());
        loop {
            self.check_aborted()?;
            if defending.interrupt() {
                let errors = defending.consecutive_errors();
                warn!(errors, "Server keeps reporting errors, interrupting session");
                return Err(CvsError::Interrupted { errors });
            }
            if let Some(success) = self.next_response(streams, &mut defending)? {
                return Ok(success);
            }
        }
    }

    /// Read and dispatch one response. `Some` once the session is over.
    fn next_response(
        &self,
        streams: &mut ConnectionStreams,
        handler: &mut dyn ResponseHandler,
    ) -> Result<Option<bool>> {
        let token = streams.reader().read_token()?;
        if token.is_empty() {
            debug!("Response stream ended without ok or error");
            return Ok(Some(false));
        }
        self.parser
            .process_response(&token, streams, handler, &self.environment)
    }

    fn check_aborted(&self) -> Result<()> {
        if self.environment.is_aborted() {
            debug!("Abort requested");
            return Err(CvsError::Aborted);
        }
        Ok(())
    }
}
