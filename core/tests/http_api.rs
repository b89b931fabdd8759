use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use orcanet_core::api::{HttpMarketApi, MarketApi};
use orcanet_core::{MarketError, Section};
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn hosting() -> Json<Value> {
	Json(json!([
		{"hash": "h1", "name": "notes", "extension": "txt", "size": 1200, "date": "2024-03-01", "price": 2},
		{"hash": "h2", "name": "clip", "extension": "video/mp4", "size": "oops", "date": "03/04/2024"}
	]))
}

async fn saved() -> Json<Value> {
	Json(Value::Null)
}

async fn explore() -> impl IntoResponse {
	(StatusCode::INTERNAL_SERVER_ERROR, "database is locked")
}

async fn add_hosting(Json(record): Json<Value>) -> String {
	if record["hash"] == "dup" {
		"The file is already being hosted.".to_string()
	} else {
		String::new()
	}
}

async fn add_sharing(Json(record): Json<Value>) -> Json<Value> {
	let hash = record["hash"].as_str().unwrap_or_default();
	Json(json!(format!("orca://share/{hash}")))
}

async fn delete_storing(body: String) -> String {
	format!("deleted {body}")
}

async fn providers(body: String) -> Json<Value> {
	match body.as_str() {
		"abc123" => Json(json!(["p1", "p2"])),
		_ => Json(Value::Null),
	}
}

async fn metadata(Json(request): Json<Value>) -> Json<Value> {
	let price = if request["peer"] == "p1" { 20 } else { 35 };
	Json(json!({
		"hash": request["hash"],
		"name": "song",
		"extension": "mp3",
		"size": 4,
		"path": "/srv/song.mp3",
		"date": "2024-05-05",
		"price": price,
	}))
}

async fn download_file(Json(request): Json<Value>) -> impl IntoResponse {
	let body = format!("{}@{}", request["hash"].as_str().unwrap_or_default(), request["price"]);
	(
		[
			(header::CONTENT_DISPOSITION, "attachment; filename=\"song.mp3\""),
			(header::CONTENT_TYPE, "audio/mpeg"),
		],
		body,
	)
}

async fn wallet() -> Json<Value> {
	Json(json!({"address": "bc1qtest", "currentBalance": 500, "pendingBalance": 1.5}))
}

async fn spawn_server() -> SocketAddr {
	let app = Router::new()
		.route("/hosting", get(hosting))
		.route("/saved", get(saved))
		.route("/explore", get(explore))
		.route("/addhosting", post(add_hosting))
		.route("/addsharing", post(add_sharing))
		.route("/deletestoring", post(delete_storing))
		.route("/getproviders", post(providers))
		.route("/requestmetadata", post(metadata))
		.route("/downloadfile", post(download_file))
		.route("/wallet", get(wallet));
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	addr
}

async fn client() -> HttpMarketApi {
	let addr = spawn_server().await;
	HttpMarketApi::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn lists_sections_leniently() {
	let api = client().await;
	let records = api.list(Section::Hosting).await.unwrap();
	assert_eq!(records.len(), 2);
	assert_eq!(records[0].price, Some(2.0));
	assert_eq!(records[1].size, None);
	assert!(records[1].date.is_some());
	assert!(api.list(Section::Saved).await.unwrap().is_empty());
}

#[tokio::test]
async fn server_errors_carry_status_and_body() {
	let api = client().await;
	match api.list(Section::Explore).await {
		Err(MarketError::Transport(message)) => {
			assert!(message.contains("500"), "{message}");
			assert!(message.contains("database is locked"), "{message}");
		}
		other => panic!("expected transport error, got {other:?}"),
	}
}

#[tokio::test]
async fn mutations_return_server_notices() {
	let api = client().await;
	let dup = orcanet_core::FileRecord::new("dup", "a.txt");
	assert_eq!(
		api.add(Section::Hosting, &dup).await.unwrap().as_deref(),
		Some("The file is already being hosted.")
	);
	let fresh = orcanet_core::FileRecord::new("new", "b.txt");
	assert_eq!(api.add(Section::Hosting, &fresh).await.unwrap(), None);
	assert_eq!(
		api.add(Section::Sharing, &fresh).await.unwrap().as_deref(),
		Some("orca://share/new")
	);
	assert_eq!(
		api.delete(Section::Storing, "h9").await.unwrap().as_deref(),
		Some("deleted h9")
	);
}

#[tokio::test]
async fn read_only_sections_are_refused_locally() {
	let api = client().await;
	let record = orcanet_core::FileRecord::new("x", "x");
	assert!(matches!(
		api.add(Section::Explore, &record).await,
		Err(MarketError::Unavailable(_))
	));
	assert!(matches!(
		api.delete(Section::Purchased, "x").await,
		Err(MarketError::Unavailable(_))
	));
}

#[tokio::test]
async fn negotiation_endpoints() {
	let api = client().await;
	assert_eq!(api.find_providers("abc123").await.unwrap(), vec!["p1", "p2"]);
	assert!(api.find_providers("deadbeef").await.unwrap().is_empty());

	let record = api.request_metadata("p2", "abc123").await.unwrap();
	assert_eq!(record.hash, "abc123");
	assert_eq!(record.price, Some(35.0));

	let download = api.download("p1", "abc123", 20.0).await.unwrap();
	assert_eq!(download.file_name.as_deref(), Some("song.mp3"));
	assert_eq!(download.content_type.as_deref(), Some("audio/mpeg"));
	assert_eq!(download.data, b"abc123@20.0");
}

#[tokio::test]
async fn reads_the_wallet() {
	let api = client().await;
	let wallet = api.wallet().await.unwrap();
	assert_eq!(wallet.current_balance, 500.0);
	assert_eq!(wallet.pending_balance, 1.5);
	assert_eq!(wallet.address.as_deref(), Some("bc1qtest"));
}

#[tokio::test]
async fn unreachable_node_is_a_transport_error() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);
	let api = HttpMarketApi::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
	assert!(api.wallet().await.unwrap_err().is_transport());
}
