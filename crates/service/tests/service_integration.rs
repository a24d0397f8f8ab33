//! Integration tests for the students service boundary.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use broker::{BrokerConfig, InMemoryBroker, MessageBus};
use common::{AggregateId, IntegrationEvent};
use metrics_exporter_prometheus::PrometheusHandle;
use service::{ApiError, Config, StudentsService};
use students::{EnrollStudent, RegisterStudent, UserRegisteredIntegrationEvent};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            service::telemetry::install_metrics().expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (InMemoryBroker, Arc<StudentsService>) {
    let broker = InMemoryBroker::new();
    let svc = StudentsService::new(Arc::new(broker.clone()), Config::default()).unwrap();
    (broker, Arc::new(svc))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

mod ops {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_broker_state() {
        let (_broker, svc) = setup();
        let app = service::ops::router(Arc::clone(&svc), get_metrics_handle());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["service"], "students");

        svc.start().await.unwrap();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["broker_connected"], true);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (_broker, svc) = setup();
        let app = service::ops::router(svc, get_metrics_handle());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_envelope() {
        let (_broker, svc) = setup();
        let app = service::ops::router(svc, get_metrics_handle());

        let response = app
            .oneshot(Request::builder().uri("/students").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["status"], 404);
        assert_eq!(json["errors"][0], "No route for /students");
    }
}

mod dispatch {
    use super::*;

    #[tokio::test]
    async fn test_valid_registration_is_200() {
        let (_broker, svc) = setup();
        let id = AggregateId::new();

        let response = svc
            .dispatch(RegisterStudent::new(id, "Ada", "ada@example.com"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.title, "Success");
        assert_eq!(response.data, Some(id));
    }

    #[tokio::test]
    async fn test_empty_name_is_400_with_one_error() {
        let (_broker, svc) = setup();

        let response = svc
            .dispatch(RegisterStudent::new(AggregateId::new(), "", "ada@example.com"))
            .await
            .unwrap();

        assert_eq!(response.status, 400);
        assert_eq!(response.title, "One or more validation errors occurred.");
        assert_eq!(response.data, None);
        assert_eq!(response.errors, vec!["Name is required".to_string()]);

        let rendered = response.into_response();
        assert_eq!(rendered.status(), StatusCode::BAD_REQUEST);
        let json = body_json(rendered).await;
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_student_is_400_not_found_message() {
        let (_broker, svc) = setup();

        let response = svc
            .dispatch(EnrollStudent::new(AggregateId::new(), AggregateId::new()))
            .await
            .unwrap();

        assert_eq!(response.status, 400);
        assert_eq!(response.errors, vec!["Student not found.".to_string()]);
        assert_eq!(svc.repository().commit_count(), 0);
    }

    #[tokio::test]
    async fn test_double_enrollment_renders_as_bad_request() {
        let (_broker, svc) = setup();
        let student_id = AggregateId::new();
        let course_id = AggregateId::new();
        svc.dispatch(RegisterStudent::new(student_id, "Ada", "ada@example.com"))
            .await
            .unwrap();
        svc.dispatch(EnrollStudent::new(student_id, course_id))
            .await
            .unwrap();

        let err: ApiError = svc
            .dispatch(EnrollStudent::new(student_id, course_id))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["status"], 400);
    }
}

mod integration {
    use super::*;

    #[tokio::test]
    async fn test_auth_requests_are_answered_after_start() {
        let (broker, svc) = setup();
        svc.start().await.unwrap();
        let auth = MessageBus::new(Arc::new(broker), &BrokerConfig::default());
        let user = UserRegisteredIntegrationEvent {
            id: AggregateId::new(),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
        };

        let response = auth.request(&user).await.unwrap();

        assert!(response.is_valid());
        assert!(svc.repository().get(user.id).is_some());
    }

    #[tokio::test]
    async fn test_start_reports_the_user_registration_responder() {
        let (_broker, svc) = setup();

        svc.start().await.unwrap();

        assert_eq!(
            svc.bus().active_subscriptions(),
            vec![format!("responder.{}", UserRegisteredIntegrationEvent::topic())]
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_broker_session() {
        let (broker, svc) = setup();
        svc.start().await.unwrap();
        assert!(svc.bus().is_connected());
        assert_eq!(broker.connect_attempts(), 1);

        svc.shutdown().await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        assert!(!svc.bus().is_connected());
        assert_eq!(broker.connect_attempts(), 1);
        assert!(svc.bus().active_subscriptions().is_empty());
    }
}
