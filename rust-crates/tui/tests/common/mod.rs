use actix_web::{
    App,
    HttpServer,
    dev::ServerHandle,
    web,
};
use std::{
    net::TcpListener,
    thread::JoinHandle,
};

/// Canned HTTP endpoints served from a background actix system.
pub struct FixtureServer {
    base_url: String,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl FixtureServer {
    pub fn start<F>(routes: F) -> Self
    where
        F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let server = HttpServer::new(move || App::new().configure(routes.clone()))
            .workers(1)
            .shutdown_timeout(1)
            .listen(listener)
            .unwrap()
            .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Self {
            base_url,
            server_handle,
            server_thread: Some(server_thread),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(false);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}
