use hyper::{HeaderMap, Method};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use warp::Filter;
use reddit_proxy::{
    AppState,
    SharedState,
    config::REDDIT_BASE_URL,
    handlers::{handle_rejection, proxy_request},
    services::build_client,
};

#[tokio::main]
async fn main() {
    let state = Arc::new(RwLock::new(AppState::new()));
    let state_filter = warp::any().map(move || state.clone());
    let client = build_client();

    let proxy = warp::any()
        .and(warp::method())
        .and(warp::header::headers_cloned())
        .and(warp::path::tail())
        .and(warp::query::raw().or_else(|_| async { Ok::<(String,), Infallible>((String::new(),)) }))
        .and(state_filter)
        .and_then(move |method: Method,
                        headers: HeaderMap,
                        tail: warp::path::Tail,
                        query: String,
                        state: SharedState| {
            let client = client.clone();
            async move {
                let start_time = SystemTime::now();

                let response = proxy_request(
                    method.clone(),
                    headers,
                    tail.as_str(),
                    &query,
                    &state,
                    &client,
                    REDDIT_BASE_URL,
                )
                .await
                .map_err(warp::reject::custom)?;

                if let Ok(duration) = start_time.elapsed() {
                    println!(
                        "{} /{} {} {}ms",
                        method,
                        tail.as_str(),
                        response.status(),
                        duration.as_millis()
                    );
                }

                Ok::<_, warp::Rejection>(response)
            }
        });

    let routes = proxy.recover(handle_rejection);

    println!("Reddit proxy running on http://127.0.0.1:3030");
    warp::serve(routes).run(([127, 0, 0, 1], 3030)).await;
}
