// tests/api_tests.rs

use std::sync::Arc;

use co_assessment::{
    config::{Config, FACULTY_ROLE},
    models::course::{Course, Student},
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test_secret_for_integration_tests";
const OWNER_ID: i64 = 1001;
const STRANGER_ID: i64 = 2002;

struct TestApp {
    address: String,
    client: reqwest::Client,
    store: Arc<MemoryStore>,
    course: Course,
    students: Vec<Student>,
    owner_token: String,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    fn token_for(employee_id: i64, role: &str) -> String {
        sign_jwt(employee_id, role, JWT_SECRET, 600).expect("Failed to sign token")
    }

    async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.owner_token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn put(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(&self.owner_token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&self.owner_token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(&self.owner_token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates the standard paper: q1 (CO1, 10), q2a (CO2, 5), q2b (CO2, 5).
    async fn create_standard_test(&self) -> Value {
        let response = self
            .post(
                "/api/tests",
                &json!({
                    "course_id": self.course.id,
                    "name": "CIA 1",
                    "full_marks": 20,
                    "pass_marks": 8,
                    "questions": [
                        { "question_number": 2, "sub_question": "b", "co": 2, "max_marks": 5 },
                        { "question_number": 1, "co": 1, "max_marks": 10 },
                        { "question_number": "2", "sub_question": "A", "co": "2", "max_marks": "5" }
                    ]
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Invalid JSON")
    }
}

/// Spawns the app on a random port, backed by an in-memory store seeded
/// with one course and three students.
async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let course = store.add_course("CS201", "Data Structures", OWNER_ID);
    let students = vec![
        store.add_student("21CS001", "Asha"),
        store.add_student("21CS002", "Bilal"),
        store.add_student("21CS003", "Chen"),
    ];

    let config = Config {
        database_url: String::new(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().expect("Invalid address"),
        max_connections: 1,
        log_dir: "logs".to_string(),
    };

    let state = AppState {
        store: store.clone(),
        config,
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        store,
        course,
        students,
        owner_token: TestApp::token_for(OWNER_ID, FACULTY_ROLE),
    }
}

fn question_id(test: &Value, identifier: &str) -> i64 {
    test["questions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["question_identifier"] == identifier)
        .and_then(|q| q["id"].as_i64())
        .unwrap_or_else(|| panic!("question {} not found", identifier))
}

fn co_values(marks: &Value) -> Vec<f64> {
    (1..=6)
        .map(|co| marks[format!("CO{}", co)].as_f64().unwrap())
        .collect()
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url(&format!("/api/courses/{}/tests", app.course.id)))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_faculty_roles_are_forbidden() {
    let app = spawn_app().await;
    let token = TestApp::token_for(OWNER_ID, "student");

    let response = app
        .client
        .get(app.url(&format!("/api/courses/{}/tests", app.course.id)))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_test_returns_questions_in_paper_order() {
    let app = spawn_app().await;

    let created = app.create_standard_test().await;

    assert_eq!(created["name"], "CIA 1");
    assert_eq!(created["course_id"], app.course.id);
    let identifiers: Vec<&str> = created["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["question_identifier"].as_str().unwrap())
        .collect();
    assert_eq!(identifiers, ["1", "2a", "2b"]);

    let test_id = created["id"].as_i64().unwrap();
    let fetched: Value = app
        .get(&format!("/api/tests/{}", test_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["questions"], created["questions"]);

    let listed: Value = app
        .get(&format!("/api/courses/{}/tests", app.course.id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_question_leaves_no_test_behind() {
    let app = spawn_app().await;

    let response = app
        .post(
            "/api/tests",
            &json!({
                "course_id": app.course.id,
                "name": "CIA 1",
                "full_marks": 20,
                "pass_marks": 8,
                "questions": [
                    { "question_number": 1, "co": 1, "max_marks": 10 },
                    { "question_number": 2, "co": 9, "max_marks": 10 }
                ]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Question 2:"));
    assert_eq!(app.store.test_count(), 0);
    assert_eq!(app.store.question_count(), 0);
}

#[tokio::test]
async fn missing_fields_are_named() {
    let app = spawn_app().await;

    let response = app
        .post(
            "/api/tests",
            &json!({ "course_id": app.course.id, "questions": [] }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("name"));
    assert!(message.contains("full_marks"));
}

#[tokio::test]
async fn other_faculty_cannot_touch_the_course() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();
    let token = TestApp::token_for(STRANGER_ID, FACULTY_ROLE);

    let response = app
        .client
        .post(app.url("/api/tests"))
        .bearer_auth(&token)
        .json(&json!({
            "course_id": app.course.id,
            "name": "Sneaky",
            "full_marks": 10,
            "pass_marks": 4,
            "questions": [{ "question_number": 1, "co": 1, "max_marks": 10 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .get(app.url(&format!("/api/tests/{}/marks", test_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.test_count(), 1);
}

#[tokio::test]
async fn bulk_upload_reports_each_row() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();

    let response = app
        .post(
            &format!("/api/tests/{}/marks/bulk", test_id),
            &json!({
                "entries": [
                    { "student_rollno": "21CS001", "question_number": 1, "marks_obtained": 8 },
                    { "student_rollno": "21CS001", "question_number": 2, "sub_question": "a", "marks_obtained": "4.5" },
                    { "student_rollno": "21CS999", "question_number": 1, "marks_obtained": 3 }
                ]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["total"], 3);
    assert_eq!(result["success_count"], 2);
    assert_eq!(result["failure_count"], 1);
    assert_eq!(result["failed"][0]["index"], 2);
    assert!(result.get("aggregation_failures").is_none());

    let marks: Value = app
        .get(&format!(
            "/api/tests/{}/students/{}/marks",
            test_id, app.students[0].id
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(co_values(&marks), [8.0, 4.5, 0.0, 0.0, 0.0, 0.0]);
}

#[tokio::test]
async fn bulk_upload_rejects_an_empty_payload() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();

    let response = app
        .post(
            &format!("/api/tests/{}/marks/bulk", test_id),
            &json!({ "entries": [] }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn one_bad_entry_aborts_the_answer_sheet() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();
    let student_id = app.students[1].id;

    let response = app
        .post(
            &format!("/api/tests/{}/students/{}/raw-marks", test_id, student_id),
            &json!({
                "marks": [
                    { "question_id": question_id(&created, "1"), "marks": 7 },
                    { "question_id": question_id(&created, "2b"), "marks": 6 }
                ]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Entry 2:"));
    assert_eq!(app.store.raw_mark_count(), 0);
    assert_eq!(app.store.marks_count(), 0);
}

#[tokio::test]
async fn answer_sheet_is_saved_and_aggregated() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();
    let student_id = app.students[1].id;

    let response = app
        .post(
            &format!("/api/tests/{}/students/{}/raw-marks", test_id, student_id),
            &json!({
                "marks": [
                    { "question_id": question_id(&created, "1"), "marks": 7 },
                    { "question_id": question_id(&created, "2a"), "marks": 2.5 },
                    { "question_id": question_id(&created, "2b"), "marks": 4 }
                ]
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let saved: Value = response.json().await.unwrap();
    assert_eq!(saved["raw_marks"].as_array().unwrap().len(), 3);
    assert_eq!(co_values(&saved["marks"]), [7.0, 6.5, 0.0, 0.0, 0.0, 0.0]);

    let raw: Value = app
        .get(&format!(
            "/api/tests/{}/students/{}/raw-marks",
            test_id, student_id
        ))
        .await
        .json()
        .await
        .unwrap();
    let identifiers: Vec<&str> = raw
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["question_identifier"].as_str().unwrap())
        .collect();
    assert_eq!(identifiers, ["1", "2a", "2b"]);
}

#[tokio::test]
async fn manual_co_entry_overwrites_totals() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();
    let student_id = app.students[2].id;
    let path = format!("/api/tests/{}/students/{}/marks", test_id, student_id);

    let response = app
        .put(
            &path,
            &json!({ "CO1": 9, "CO2": 0, "CO3": 2.5, "CO4": 0, "CO5": 0, "CO6": 0 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let marks: Value = response.json().await.unwrap();
    assert_eq!(co_values(&marks), [9.0, 0.0, 2.5, 0.0, 0.0, 0.0]);
    assert_eq!(app.store.raw_mark_count(), 0);

    let response = app
        .put(
            &path,
            &json!({ "CO1": 0, "CO2": -1, "CO3": 0, "CO4": 0, "CO5": 0, "CO6": 0 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Misspelled and missing outcomes are rejected, not stored as zero.
    let response = app.put(&path, &json!({ "co1": 5, "CO2": 3 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("CO1"));

    let response = app.put(&path, &json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let stored: Value = app.get(&path).await.json().await.unwrap();
    assert_eq!(co_values(&stored), [9.0, 0.0, 2.5, 0.0, 0.0, 0.0]);

    let listed: Value = app
        .get(&format!("/api/tests/{}/marks", test_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_raw_marks_re_aggregates() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();
    let student_id = app.students[0].id;

    let saved: Value = app
        .post(
            &format!("/api/tests/{}/raw-marks", test_id),
            &json!({
                "student_id": student_id,
                "question_id": question_id(&created, "1"),
                "marks_obtained": 6
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let first_id = saved["raw_marks"][0]["id"].as_i64().unwrap();

    app.post(
        &format!("/api/tests/{}/raw-marks", test_id),
        &json!({
            "student_id": student_id,
            "question_id": question_id(&created, "2a"),
            "marks": 3
        }),
    )
    .await;

    let response = app
        .delete(&format!("/api/tests/{}/raw-marks/{}", test_id, first_id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let marks: Value = response.json().await.unwrap();
    assert_eq!(co_values(&marks), [0.0, 3.0, 0.0, 0.0, 0.0, 0.0]);

    let response = app
        .delete(&format!(
            "/api/tests/{}/students/{}/raw-marks",
            test_id, student_id
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared: Value = response.json().await.unwrap();
    assert_eq!(cleared["deleted"], 1);
    assert_eq!(co_values(&cleared["marks"]), [0.0; 6]);

    let response = app
        .delete(&format!(
            "/api/tests/{}/students/{}/marks",
            test_id, student_id
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.store.marks_count(), 0);
}

#[tokio::test]
async fn explicit_re_aggregation_restores_derived_totals() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();
    let student_id = app.students[0].id;

    app.post(
        &format!("/api/tests/{}/raw-marks", test_id),
        &json!({
            "student_id": student_id,
            "question_id": question_id(&created, "1"),
            "marks": 5
        }),
    )
    .await;
    app.put(
        &format!("/api/tests/{}/students/{}/marks", test_id, student_id),
        &json!({ "CO1": 0, "CO2": 0, "CO3": 0, "CO4": 0, "CO5": 0, "CO6": 1 }),
    )
    .await;

    let response = app
        .post(
            &format!(
                "/api/tests/{}/students/{}/marks/aggregate",
                test_id, student_id
            ),
            &json!({}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let marks: Value = response.json().await.unwrap();
    assert_eq!(co_values(&marks), [5.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
}

#[tokio::test]
async fn deleting_a_test_removes_its_marks() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();

    app.post(
        &format!("/api/tests/{}/raw-marks", test_id),
        &json!({
            "student_id": app.students[0].id,
            "question_id": question_id(&created, "1"),
            "marks": 5
        }),
    )
    .await;

    let response = app.delete(&format!("/api/tests/{}", test_id)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.store.test_count(), 0);
    assert_eq!(app.store.raw_mark_count(), 0);
    assert_eq!(app.store.marks_count(), 0);

    let response = app.get(&format!("/api/tests/{}", test_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_get_a_json_400() {
    let app = spawn_app().await;
    let created = app.create_standard_test().await;
    let test_id = created["id"].as_i64().unwrap();

    let response = app
        .post(
            &format!("/api/tests/{}/raw-marks", test_id),
            &json!({ "question_id": question_id(&created, "1"), "marks": 4 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("student_id"));

    let response = app
        .post(
            "/api/tests",
            &json!({ "course_id": "not-a-number", "name": "CIA 2", "questions": [] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
    assert_eq!(app.store.test_count(), 1);
    assert_eq!(app.store.raw_mark_count(), 0);
}
