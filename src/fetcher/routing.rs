use super::{FailureResource, Fetcher, Resource};
use crate::manifest::Link;

/// A fetcher and the links it accepts.
pub struct Route {
    fetcher: Box<dyn Fetcher>,
    accepts: Box<dyn Fn(&Link) -> bool + Send + Sync>,
}

impl Route {
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        accepts: impl Fn(&Link) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            fetcher,
            accepts: Box::new(accepts),
        }
    }

    /// A route accepting every link.
    pub fn fallback(fetcher: Box<dyn Fetcher>) -> Self {
        Self::new(fetcher, |_| true)
    }
}

/// Dispatches each link to the first route accepting it.
pub struct RoutingFetcher {
    routes: Vec<Route>,
}

impl RoutingFetcher {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }
}

impl Fetcher for RoutingFetcher {
    fn links(&self) -> Vec<Link> {
        self.routes.iter().flat_map(|r| r.fetcher.links()).collect()
    }

    fn get(&self, link: &Link) -> Box<dyn Resource> {
        match self.routes.iter().find(|r| (r.accepts)(link)) {
            Some(route) => route.fetcher.get(link),
            None => Box::new(FailureResource::not_found(link.clone())),
        }
    }

    fn close(&self) {
        for route in &self.routes {
            route.fetcher.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{BytesResource, EmptyFetcher};
    use crate::util::is_http_url;

    struct Fixed(&'static [u8]);

    impl Fetcher for Fixed {
        fn links(&self) -> Vec<Link> {
            vec![Link::new("/fixed")]
        }

        fn get(&self, link: &Link) -> Box<dyn Resource> {
            Box::new(BytesResource::new(link.clone(), self.0.to_vec()))
        }
    }

    #[test]
    fn test_first_match_wins() {
        let fetcher = RoutingFetcher::new(vec![
            Route::new(Box::new(Fixed(b"remote")), |l| is_http_url(&l.href)),
            Route::fallback(Box::new(Fixed(b"local"))),
        ]);
        assert_eq!(fetcher.get(&Link::new("https://x/a")).read(None).unwrap(), b"remote");
        assert_eq!(fetcher.get(&Link::new("/a")).read(None).unwrap(), b"local");
        assert_eq!(fetcher.links().len(), 2);
    }

    #[test]
    fn test_no_route() {
        let fetcher = RoutingFetcher::new(vec![Route::new(Box::new(EmptyFetcher), |_| false)]);
        assert_eq!(fetcher.get(&Link::new("/a")).read(None).unwrap_err().status(), 404);
    }
}
