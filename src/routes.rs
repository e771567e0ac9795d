use crate::server::request::RequestCtx;
use crate::server::response::ResponseSink;
use http::Method;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

/// Route handler invoked by the protocol engine for a matched URI.
pub type Handler =
    Arc<dyn Fn(&RequestCtx, &mut dyn ResponseSink) -> io::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RouteKey {
    method: Method,
    path: String,
}

/// Exact-match table of registered URI handlers.
///
/// Capacity-bounded the way the embedded engine bounds its handler slots;
/// duplicate registration and missing unregistration are reported as engine
/// errors so callers see them verbatim.
pub struct RouteTable {
    routes: HashMap<RouteKey, Handler>,
    max_routes: usize,
}

impl RouteTable {
    pub fn new(max_routes: usize) -> Self {
        Self {
            routes: HashMap::new(),
            max_routes,
        }
    }

    pub fn register(&mut self, path: &str, method: Method, handler: Handler) -> io::Result<()> {
        if self.routes.len() >= self.max_routes {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "no free URI handler slots",
            ));
        }
        let key = RouteKey {
            method,
            path: path.to_string(),
        };
        if self.routes.contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "URI handler already registered",
            ));
        }
        self.routes.insert(key, handler);
        Ok(())
    }

    pub fn unregister(&mut self, path: &str, method: Method) -> io::Result<()> {
        let key = RouteKey {
            method,
            path: path.to_string(),
        };
        match self.routes.remove(&key) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "URI handler not registered",
            )),
        }
    }

    pub fn lookup(&self, path: &str, method: &Method) -> Option<Handler> {
        let key = RouteKey {
            method: method.clone(),
            path: path.to_string(),
        };
        self.routes.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler() -> Handler {
        Arc::new(|_req, _res| Ok(()))
    }

    #[test]
    fn register_then_lookup() {
        let mut table = RouteTable::new(4);
        table
            .register("/status", Method::GET, noop_handler())
            .unwrap();
        assert!(table.lookup("/status", &Method::GET).is_some());
        assert!(table.lookup("/status", &Method::POST).is_none());
        assert!(table.lookup("/other", &Method::GET).is_none());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut table = RouteTable::new(4);
        table.register("/a", Method::GET, noop_handler()).unwrap();
        let err = table
            .register("/a", Method::GET, noop_handler())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn unregister_restores_table() {
        let mut table = RouteTable::new(4);
        table.register("/a", Method::GET, noop_handler()).unwrap();
        table.unregister("/a", Method::GET).unwrap();
        assert!(table.is_empty());
        let err = table.unregister("/a", Method::GET).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn capacity_bound_enforced() {
        let mut table = RouteTable::new(1);
        table.register("/a", Method::GET, noop_handler()).unwrap();
        let err = table
            .register("/b", Method::GET, noop_handler())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
    }
}
