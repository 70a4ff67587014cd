// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{assessment, marks},
    state::AppState,
    utils::jwt::{auth_middleware, faculty_middleware},
};

/// Assembles the main application router.
///
/// * Every `/api` route requires a valid token carrying the faculty role.
/// * Course ownership is checked per operation in the services.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let test_routes = Router::new()
        .route("/", post(assessment::create_test))
        .route(
            "/{test_id}",
            get(assessment::get_test).delete(assessment::delete_test),
        )
        .route("/{test_id}/questions", get(assessment::list_questions))
        .route("/{test_id}/marks", get(marks::list_test_marks))
        .route("/{test_id}/marks/bulk", post(marks::bulk_save_marks))
        .route("/{test_id}/raw-marks", post(marks::save_raw_mark))
        .route(
            "/{test_id}/raw-marks/{raw_mark_id}",
            delete(marks::delete_raw_mark),
        )
        .route(
            "/{test_id}/students/{student_id}/raw-marks",
            get(marks::list_raw_marks)
                .post(marks::save_marks_by_question)
                .delete(marks::clear_raw_marks),
        )
        .route(
            "/{test_id}/students/{student_id}/marks",
            get(marks::get_student_marks)
                .put(marks::save_marks_by_co)
                .delete(marks::delete_student_marks),
        )
        .route(
            "/{test_id}/students/{student_id}/marks/aggregate",
            post(marks::refresh_student_marks),
        );

    let course_routes =
        Router::new().route("/{course_id}/tests", get(assessment::list_course_tests));

    let api_routes = Router::new()
        .nest("/tests", test_routes)
        .nest("/courses", course_routes)
        // Auth first, then the role check
        .layer(middleware::from_fn(faculty_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
