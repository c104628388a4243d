//! HTTP front end: `POST /predict`.
//!
//! Requests are served on a single-threaded runtime. Inference runs on the
//! blocking pool behind one mutex, so the engine only ever sees one image at
//! a time.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::module::error::{Error, Result};
use crate::module::util::init::MutascanProperty;
use crate::module::util::path::cache::CacheFile;
use crate::module::vision::MutascanVision;

/// Body of `POST /predict`.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub img_path: String,
}

/// Reply of `POST /predict`. `pred_boxes` holds four values per class entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub img_result: String,
    pub pred_classes: Vec<f64>,
    pub scores: Vec<f64>,
    pub pred_boxes: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorResponse {
            error_type: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    vision: Arc<Mutex<MutascanVision>>,
    output: Arc<CacheFile>,
}

impl AppState {
    /// `output` names the overlay files written for each request.
    pub fn new(vision: MutascanVision, output: CacheFile) -> Self {
        Self {
            vision: Arc::new(Mutex::new(vision)),
            output: Arc::new(output),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .with_state(state)
}

/// POST /predict
///
/// Runs the detector on `img_path`, writes the overlay under the cache root
/// and answers with its path and the raw predictions.
pub async fn predict_handler(
    State(st): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(req) = payload.map_err(|e| {
        log::warn!("Rejected predict request: {}", e.body_text());
        Error::RequestValidation(e.body_text())
    })?;
    let img_path = req.img_path;
    log::info!("Start predict: {}", img_path);

    let path = img_path.clone();
    let res = tokio::task::spawn_blocking(move || predict_and_save(&st, &path))
        .await
        .map_err(|e| Error::Inference(format!("predict task failed: {}", e)))
        .and_then(|r| r);

    match res {
        Ok(resp) => {
            log::info!(
                "Done predict: {} ({} detections) -> {}",
                img_path,
                resp.scores.len(),
                resp.img_result
            );
            Ok(Json(resp))
        }
        Err(e) => {
            log::error!("Predict failed for {}: {}", img_path, e);
            Err(e)
        }
    }
}

fn predict_and_save(st: &AppState, img_path: &str) -> Result<PredictResponse> {
    let pred = {
        // `predict` takes `&self`, so a panic in an earlier request leaves nothing half-updated.
        let vision = st.vision.lock().unwrap_or_else(PoisonError::into_inner);
        vision.predict(img_path)?
    };

    let out = st.output.timestamp()?;
    pred.overlay.save(&out).map_err(|e| Error::ImageEncode {
        path: out.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(PredictResponse {
        img_result: out.to_string_lossy().into_owned(),
        pred_classes: pred.pred_classes(),
        scores: pred.scores(),
        pred_boxes: pred.pred_boxes(),
    })
}

/// Serves the API until the listener fails.
pub fn run(property: &MutascanProperty, vision: MutascanVision) -> Result<()> {
    let output = CacheFile::new(&property.path.dir.cache)
        .prefix(&property.conf.output.prefix)
        .filetype(&property.conf.output.filetype);
    let state = AppState::new(vision, output);
    let addr = format!("{}:{}", property.conf.server.host, property.conf.server.port);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        log::info!("Listening on http://{}", addr);
        axum::serve(listener, router(state)).await?;
        Ok::<(), Error>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::vision::detector::{Detect, Detection};
    use axum::body::Body;
    use axum::http::Request;
    use image::{Rgb, RgbImage};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    struct Stub;

    impl Detect for Stub {
        fn detect(&self, _img: &RgbImage) -> Result<Vec<Detection>> {
            Ok(vec![
                Detection {
                    x1: 1.0,
                    y1: 2.0,
                    x2: 11.0,
                    y2: 12.0,
                    cls: 1,
                    prob: 0.9,
                },
                Detection {
                    x1: 20.0,
                    y1: 5.0,
                    x2: 30.0,
                    y2: 25.0,
                    cls: 2,
                    prob: 0.875,
                },
            ])
        }
    }

    /// Panics on its first call, then behaves like `Stub`.
    struct PanicsOnce(AtomicBool);

    impl Detect for PanicsOnce {
        fn detect(&self, img: &RgbImage) -> Result<Vec<Detection>> {
            if !self.0.swap(true, Ordering::SeqCst) {
                panic!("engine crashed");
            }
            Stub.detect(img)
        }
    }

    fn app(cache: &Path) -> Router {
        let output = CacheFile::new(cache)
            .prefix("mutaSCAN_predict_result")
            .filetype("jpg");
        router(AppState::new(MutascanVision::new(Box::new(Stub)), output))
    }

    async fn post(app: Router, body: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn predict_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("in.png");
        RgbImage::from_pixel(40, 40, Rgb([10, 200, 10]))
            .save(&img)
            .unwrap();
        let cache = tmp.path().join("cache");

        let body = serde_json::json!({ "img_path": img }).to_string();
        let (status, bytes) = post(app(&cache), &body).await;
        assert_eq!(status, StatusCode::OK);

        let resp: PredictResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(resp.pred_classes, vec![1.0, 2.0]);
        assert_eq!(resp.scores, vec![0.8999999761581421, 0.875]);
        assert_eq!(resp.pred_boxes.len(), 4 * resp.pred_classes.len());
        assert_eq!(&resp.pred_boxes[..4], &[1.0, 2.0, 11.0, 12.0]);

        let out = Path::new(&resp.img_result);
        assert!(out.is_file());
        assert_eq!(out.parent().unwrap(), cache);
        let name = out.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("mutaSCAN_predict_result_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(image::open(out).unwrap().to_rgb8().dimensions(), (60, 60));
    }

    #[tokio::test]
    async fn missing_img_path_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, bytes) = post(app(tmp.path()), r#"{"path": "x.jpg"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err.error_type, "request_validation_error");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, _) = post(app(tmp.path()), "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unreadable_image_is_server_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (status, bytes) = post(app(tmp.path()), r#"{"img_path": "/no/such.jpg"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err.error_type, "image_decode_error");
        assert!(err.message.contains("/no/such.jpg"));
    }

    #[tokio::test]
    async fn keeps_serving_after_engine_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("in.png");
        RgbImage::from_pixel(40, 40, Rgb([10, 200, 10]))
            .save(&img)
            .unwrap();
        let output = CacheFile::new(tmp.path().join("cache"))
            .prefix("mutaSCAN_predict_result")
            .filetype("jpg");
        let detector = PanicsOnce(AtomicBool::new(false));
        let app = router(AppState::new(MutascanVision::new(Box::new(detector)), output));
        let body = serde_json::json!({ "img_path": img }).to_string();

        let (status, bytes) = post(app.clone(), &body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err.error_type, "inference_error");

        let (status, bytes) = post(app, &body).await;
        assert_eq!(status, StatusCode::OK);
        let resp: PredictResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(resp.pred_classes, vec![1.0, 2.0]);
    }
}
