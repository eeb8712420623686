//! Caller-identity extraction for rate limiting: `X-Api-Key`, else the
//! bearer token, else `anonymous`. This is the gateway's only notion of
//! "who is calling" — no authentication or authorization beyond this.

use actix_web::HttpRequest;

pub fn extract_identity(req: &HttpRequest) -> String {
    if let Some(key) = req
        .headers()
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return key.to_string();
    }

    if let Some(auth) = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            if !token.is_empty() {
                return token.to_string();
            }
        }
    }

    "anonymous".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn prefers_api_key_header() {
        let req = TestRequest::default()
            .insert_header(("X-Api-Key", "key-123"))
            .insert_header(("Authorization", "Bearer tok-456"))
            .to_http_request();
        assert_eq!(extract_identity(&req), "key-123");
    }

    #[test]
    fn falls_back_to_bearer_token() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer tok-456"))
            .to_http_request();
        assert_eq!(extract_identity(&req), "tok-456");
    }

    #[test]
    fn falls_back_to_anonymous() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(extract_identity(&req), "anonymous");
    }
}
