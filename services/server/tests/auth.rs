mod common;

#[tokio::test]
async fn get_auth_redirects_to_the_identity_providers_authorize_endpoint() {
    let server = common::spawn().await;
    let client = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap();

    let resp = client.get(server.http_url("/auth")).send().await.expect("send");

    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    let location = resp.headers().get(reqwest::header::LOCATION).expect("Location header").to_str().unwrap();
    assert!(location.starts_with("https://login.example.edu/authorize"));
    assert!(location.contains("client_id=c"));
}

#[tokio::test]
async fn the_home_pages_sign_in_link_points_at_a_working_get_route() {
    let server = common::spawn().await;
    let client = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap();

    let home = client.get(server.http_url("/")).send().await.expect("send");
    let body = home.text().await.expect("body");
    assert!(body.contains(r#"<a href="/auth">"#));

    let resp = client.get(server.http_url("/auth")).send().await.expect("send");
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
}
