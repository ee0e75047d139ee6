use formscan::{
    config::FormscanConfig,
    ocr::{
        scripted::{tsv_table, ScriptedEngine},
        OutputMode, Psm,
    },
    FormReader,
};
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};
use tests::{blank_png, test_with_server};

fn reader(engine: ScriptedEngine) -> FormReader {
    FormReader::new(FormscanConfig::default())
        .unwrap()
        .with_engine(engine)
}

fn upload(file_name: &str, bytes: Vec<u8>) -> multipart::Form {
    multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name.to_owned()))
}

async fn post_ocr(addr: std::net::SocketAddr, form: multipart::Form) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}/ocr", addr))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn health() {
    let test = |addr| async move {
        let body: Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    };

    test_with_server(reader(ScriptedEngine::new()), test)
        .await
        .unwrap();
}

#[tokio::test]
async fn unsupported_upload_is_rejected() {
    let test = |addr| async move {
        let (status, body) = post_ocr(addr, upload("notes.txt", b"hello".to_vec())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], json!(false));
        assert!(body["message"].as_str().unwrap().contains("notes.txt"));
    };

    test_with_server(reader(ScriptedEngine::new()), test)
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let test = |addr| async move {
        let form = multipart::Form::new().text("note", "no file here");
        let (status, body) = post_ocr(addr, form).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], json!(false));
    };

    test_with_server(reader(ScriptedEngine::new()), test)
        .await
        .unwrap();
}

#[tokio::test]
async fn labelled_surname_is_extracted() {
    let engine = ScriptedEngine::new()
        .answer(
            OutputMode::Tsv,
            Psm::SparseText,
            tsv_table(&[
                ("DELACRUZ", 90, 10, 110, 35),
                ("Last", 100, 50, 40, 14),
                ("Name", 160, 52, 40, 14),
            ]),
        )
        .answer(OutputMode::Text, Psm::SparseText, "DELACRUZ\nLast Name\n");

    let test = |addr| async move {
        let (status, body) = post_ocr(addr, upload("form.png", blank_png(400, 200))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "success": true,
                "data": {
                    "last_name": "DELACRUZ",
                    "first_name": "",
                    "middle_name": "",
                    "fallback_used": false,
                    "raw_text": "DELACRUZ\nLast Name\n",
                }
            })
        );
    };

    test_with_server(reader(engine), test).await.unwrap();
}

#[tokio::test]
async fn unreadable_form_succeeds_with_empty_names() {
    let test = |addr| async move {
        let (status, body) = post_ocr(addr, upload("form.jpg", b"garbage".to_vec())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["last_name"], json!(""));
        assert_eq!(body["data"]["fallback_used"], json!(false));
    };

    test_with_server(reader(ScriptedEngine::failing()), test)
        .await
        .unwrap();
}
