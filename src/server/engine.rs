use std::sync::Arc;

use tracing::debug;

use crate::call::CallInfo;
use crate::config::Config;
use crate::dispatch::{DispatchTable, Dispatcher, NO_ROUTE};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::router::{EndpointFlags, Router};
use crate::session::{SessionStore, SessionSweeper};

/// Frozen routing, dispatch and session state shared by all connections.
pub struct Engine {
    config: Config,
    router: Router,
    dispatcher: Dispatcher,
    sessions: Arc<SessionStore>,
    _sweeper: SessionSweeper,
}

impl Engine {
    pub(crate) fn start(
        config: Config,
        router: Router,
        table: DispatchTable,
        sessions: Arc<SessionStore>,
    ) -> std::io::Result<Self> {
        let dispatcher = Dispatcher::new(table)?;
        let sweeper = sessions.start_sweeper(config.session.sweep_interval())?;
        Ok(Self {
            config,
            router,
            dispatcher,
            sessions,
            _sweeper: sweeper,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Runs one exchange: route, bind the session, dispatch, and wait for
    /// the completion.
    pub async fn handle(&self, mut request: Request) -> Response {
        let (endpoint_id, flags) = match self.router.match_route(request.method.as_str(), &request.uri)
        {
            Some(matched) => {
                let id = matched.endpoint.id as isize;
                let flags = matched.endpoint.flags;
                request.set_params(matched.params);
                (id, flags)
            }
            None => (NO_ROUTE, EndpointFlags::default()),
        };

        if !flags.read_body {
            request.discard_body();
        }

        let cookie_name = &self.config.session.cookie_name;
        let cookie_session = request.cookie(cookie_name).map(str::to_string);
        request.attach_sessions(Arc::clone(&self.sessions));
        match cookie_session.as_deref() {
            Some(id) if request.load_session(id) => {}
            _ if flags.init_session => {
                request.create_session();
            }
            _ => {}
        }

        let request = Arc::new(request);
        let (call, completion) = CallInfo::channel(Arc::clone(&request));
        self.dispatcher.dispatch(endpoint_id, call);

        let mut response = match completion.await {
            Ok(response) => response,
            Err(_) => Response::internal_error("completion channel closed"),
        };

        if let Some(id) = request.session_id() {
            if cookie_session.as_deref() != Some(id.as_str()) {
                debug!(session_id = %id, "Issuing session cookie");
                response.set_cookie(cookie_name.as_str(), id);
            }
        }

        response
    }
}
