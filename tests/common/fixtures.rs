//! PokeAPI-shaped payloads and mock mounting helpers

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// URL of a member sub-resource on the mock server
pub fn member_url(server: &MockServer, member: &str) -> String {
    format!("{}/pokemon/{}/", server.uri(), member)
}

/// A `/type/{key}` body listing `members`, whose URLs point at `server`
pub fn type_body(server: &MockServer, members: &[&str]) -> Value {
    let pokemon: Vec<Value> = members
        .iter()
        .enumerate()
        .map(|(slot, name)| {
            json!({
                "slot": slot + 1,
                "pokemon": {"name": name, "url": member_url(server, name)}
            })
        })
        .collect();

    json!({
        "id": 2,
        "name": "fighting",
        "pokemon": pokemon
    })
}

/// A member body whose `forms` field is `forms`
pub fn member_body(name: &str, forms: Value) -> Value {
    json!({
        "id": 1,
        "name": name,
        "height": 7,
        "forms": forms
    })
}

/// Mount `GET /type/{key}` listing `members`
pub async fn mount_type(server: &MockServer, key: i64, members: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/type/{key}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(type_body(server, members)))
        .mount(server)
        .await;
}

/// Mount `GET /pokemon/{member}/` returning `forms`
pub async fn mount_member(server: &MockServer, member: &str, forms: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/pokemon/{member}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(member_body(member, forms)))
        .mount(server)
        .await;
}

/// Mount the three-member fixture used by most tests: members a, b, c with forms f1, f2, f3
pub async fn mount_abc(server: &MockServer, key: i64) {
    mount_type(server, key, &["a", "b", "c"]).await;
    mount_member(server, "a", json!(["f1"])).await;
    mount_member(server, "b", json!(["f2"])).await;
    mount_member(server, "c", json!(["f3"])).await;
}
