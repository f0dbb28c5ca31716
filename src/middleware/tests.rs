#[cfg(test)]
mod tests {
    use hyper::HeaderMap;
    use crate::middleware::{add_cors_headers, client_key};

    #[test]
    fn test_add_cors_headers() {
        let mut headers = HeaderMap::new();
        add_cors_headers(&mut headers);

        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert_eq!(
            headers.get("access-control-allow-methods").unwrap(),
            "GET, OPTIONS"
        );
        assert_eq!(
            headers.get("access-control-allow-headers").unwrap(),
            "Content-Type"
        );
    }

    #[test]
    fn test_client_key_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.1".parse().unwrap());

        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_key_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());

        assert_eq!(client_key(&headers), "198.51.100.4");
    }

    #[test]
    fn test_client_key_unknown_sentinel() {
        let headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "unknown");
    }

    #[test]
    fn test_client_key_empty_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "".parse().unwrap());

        assert_eq!(client_key(&headers), "unknown");
    }
}
