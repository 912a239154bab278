use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::camera::{claim_capture, CaptureClaim, CaptureDevice, FrameSource, LatestFrame};
use crate::config::Config;
use crate::pose::detector::{LandmarkDetector, MoveNetDetector};
use crate::pose::metrics::{extract_metrics, PoseMetrics};

/// フレーム取得の連続失敗の上限。超えるとデバイス異常としてワーカーを停止
const MAX_CONSECUTIVE_FRAME_ERRORS: u32 = 30;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// キャプチャデバイスを取得できない（既に使用中、または接続なし）
    #[error("capture device unavailable: {0}")]
    CaptureUnavailable(String),
}

/// パイプラインの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
}

const PHASE_STOPPED: u8 = 0;
const PHASE_STARTING: u8 = 1;
const PHASE_RUNNING: u8 = 2;

/// ワーカーと共有する状態
struct Shared {
    metrics: Mutex<Option<PoseMetrics>>,
    stop: AtomicBool,
    phase: AtomicU8,
}

/// キャプチャ→ランドマーク検出→メトリクス算出を行うワーカーの管理
///
/// ワーカーはデバイス使用権・フレーム供給元・検出器を所有し、
/// 終了時にすべてを解放する。stop()はワーカーのjoin後に戻るため、
/// 戻った時点で次のstart()が即座にデバイスを再取得できる。
/// メトリクスはコピーで受け渡しされ、ワーカーと共有されない。
pub struct PoseCapturePipeline {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PoseCapturePipeline {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                metrics: Mutex::new(None),
                stop: AtomicBool::new(false),
                phase: AtomicU8::new(PHASE_STOPPED),
            }),
            worker: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        match self.shared.phase.load(Ordering::Acquire) {
            PHASE_STARTING => PipelineState::Starting,
            PHASE_RUNNING => PipelineState::Running,
            _ => PipelineState::Stopped,
        }
    }

    /// 設定に従ってカメラとMoveNet検出器でワーカーを起動
    pub fn start(&mut self, config: &Config) -> Result<(), PipelineError> {
        let claim = self.begin_start()?;

        let device = match CaptureDevice::open(&config.camera) {
            Ok(device) => device,
            Err(e) => return Err(self.abort_start(claim, e.to_string())),
        };
        let detector =
            match MoveNetDetector::new(&config.pose.model_path, config.pose.confidence_threshold) {
                Ok(detector) => detector,
                Err(e) => return Err(self.abort_start(claim, e.to_string())),
            };

        let source = LatestFrame::start(device, Duration::from_millis(config.pose.frame_timeout_ms));
        self.spawn_worker(claim, Box::new(source), Box::new(detector));
        Ok(())
    }

    /// 任意のフレーム供給元と検出器でワーカーを起動（テスト・代替検出器用）
    pub fn start_with(
        &mut self,
        source: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkDetector>,
    ) -> Result<(), PipelineError> {
        let claim = self.begin_start()?;
        self.spawn_worker(claim, source, detector);
        Ok(())
    }

    /// 使用権を取得してStartingに入る。取得できなければStoppedのまま
    fn begin_start(&mut self) -> Result<CaptureClaim, PipelineError> {
        if self.state() != PipelineState::Stopped {
            return Err(PipelineError::CaptureUnavailable(
                "pipeline already running".to_string(),
            ));
        }
        let claim = claim_capture().ok_or_else(|| {
            PipelineError::CaptureUnavailable("capture device already in use".to_string())
        })?;
        self.shared.phase.store(PHASE_STARTING, Ordering::Release);
        Ok(claim)
    }

    /// 起動途中の失敗: 使用権をここで解放してStoppedに戻す
    fn abort_start(&mut self, claim: CaptureClaim, reason: String) -> PipelineError {
        drop(claim);
        self.shared.phase.store(PHASE_STOPPED, Ordering::Release);
        PipelineError::CaptureUnavailable(reason)
    }

    fn spawn_worker(
        &mut self,
        claim: CaptureClaim,
        mut source: Box<dyn FrameSource>,
        mut detector: Box<dyn LandmarkDetector>,
    ) {
        let shared = self.shared.clone();
        shared.stop.store(false, Ordering::Relaxed);

        let handle = thread::spawn(move || {
            // ワーカー終了時に解放される（供給元→デバイスの順）
            let _claim = claim;
            shared.phase.store(PHASE_RUNNING, Ordering::Release);

            let mut consecutive_errors = 0u32;
            while !shared.stop.load(Ordering::Relaxed) {
                let frame = match source.next_frame() {
                    Ok(frame) => {
                        consecutive_errors = 0;
                        frame
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors > MAX_CONSECUTIVE_FRAME_ERRORS {
                            eprintln!("Capture failed repeatedly, stopping worker: {}", e);
                            break;
                        }
                        continue;
                    }
                };

                // 検出失敗・関節欠損はこのフレームだけ破棄して続行
                let landmarks = match detector.detect(&frame) {
                    Ok(Some(landmarks)) => landmarks,
                    Ok(None) | Err(_) => continue,
                };
                if let Some(metrics) = extract_metrics(&landmarks) {
                    *shared.metrics.lock().unwrap() = Some(metrics);
                }
            }

            shared.phase.store(PHASE_STOPPED, Ordering::Release);
        });

        self.worker = Some(handle);
    }

    /// 最新メトリクスのコピー。未検出・停止中はNone
    pub fn latest_metrics(&self) -> Option<PoseMetrics> {
        *self.shared.metrics.lock().unwrap()
    }

    /// ワーカーを停止する。いつ呼んでも安全（停止済みならno-op）
    /// キャプチャデバイスの解放が完了してから戻る
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.shared.phase.store(PHASE_STOPPED, Ordering::Release);
        *self.shared.metrics.lock().unwrap() = None;
    }
}

impl Default for PoseCapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PoseCapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::claim_test_lock;
    use crate::pose::landmark::{Landmark, LandmarkSet};
    use anyhow::Result;
    use opencv::core::Mat;
    use std::time::Instant;

    /// 空のMatを一定間隔で供給するフェイク
    struct FakeSource {
        interval: Duration,
    }

    impl FrameSource for FakeSource {
        fn next_frame(&mut self) -> Result<Mat> {
            thread::sleep(self.interval);
            Ok(Mat::default())
        }
    }

    /// 常に同じ完全なランドマーク集合を返すフェイク
    struct FakeDetector;

    impl LandmarkDetector for FakeDetector {
        fn detect(&mut self, _frame: &Mat) -> Result<Option<LandmarkSet>> {
            Ok(Some(LandmarkSet::complete(
                Landmark::new(0.4, 0.2),
                Landmark::new(0.6, 0.2),
                Landmark::new(0.42, 0.6),
                Landmark::new(0.58, 0.6),
            )))
        }
    }

    /// 常に失敗するフェイク検出器
    struct FailingDetector;

    impl LandmarkDetector for FailingDetector {
        fn detect(&mut self, _frame: &Mat) -> Result<Option<LandmarkSet>> {
            anyhow::bail!("detection failed")
        }
    }

    fn fake_source() -> Box<dyn FrameSource> {
        Box::new(FakeSource {
            interval: Duration::from_millis(2),
        })
    }

    /// メトリクスが公開されるまで待つ（最大1秒）
    fn wait_for_metrics(pipeline: &PoseCapturePipeline) -> Option<PoseMetrics> {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if let Some(m) = pipeline.latest_metrics() {
                return Some(m);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_pipeline_publishes_metrics() {
        let _guard = claim_test_lock();

        let mut pipeline = PoseCapturePipeline::new();
        pipeline
            .start_with(fake_source(), Box::new(FakeDetector))
            .unwrap();

        let metrics = wait_for_metrics(&pipeline).expect("metrics should be published");
        assert!((metrics.stance_width - 0.16).abs() < 1e-6);
        assert_eq!(pipeline.state(), PipelineState::Running);

        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        // 停止後はメトリクスなし
        assert_eq!(pipeline.latest_metrics(), None);
    }

    #[test]
    fn test_double_start_rejected_single_claim() {
        let _guard = claim_test_lock();

        let mut pipeline = PoseCapturePipeline::new();
        pipeline
            .start_with(fake_source(), Box::new(FakeDetector))
            .unwrap();

        // 2回目のstartは拒否され、使用権は1つのまま
        let err = pipeline
            .start_with(fake_source(), Box::new(FakeDetector))
            .unwrap_err();
        assert!(matches!(err, PipelineError::CaptureUnavailable(_)));

        let mut second = PoseCapturePipeline::new();
        let err = second
            .start_with(fake_source(), Box::new(FakeDetector))
            .unwrap_err();
        assert!(matches!(err, PipelineError::CaptureUnavailable(_)));

        // 停止後は再起動できる
        pipeline.stop();
        second
            .start_with(fake_source(), Box::new(FakeDetector))
            .unwrap();
        second.stop();
    }

    #[test]
    fn test_detection_failure_keeps_pipeline_running() {
        let _guard = claim_test_lock();

        let mut pipeline = PoseCapturePipeline::new();
        pipeline
            .start_with(fake_source(), Box::new(FailingDetector))
            .unwrap();

        // 検出失敗はフレーム単位で破棄されるだけで、ワーカーは生き続ける
        thread::sleep(Duration::from_millis(50));
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert_eq!(pipeline.latest_metrics(), None);

        pipeline.stop();
    }

    #[test]
    fn test_stop_idempotent() {
        let _guard = claim_test_lock();

        let mut pipeline = PoseCapturePipeline::new();
        // 起動していなくても安全
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        pipeline
            .start_with(fake_source(), Box::new(FakeDetector))
            .unwrap();
        pipeline.stop();
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_incomplete_landmarks_no_metrics() {
        let _guard = claim_test_lock();

        /// 一部の関節しか返さないフェイク
        struct PartialDetector;
        impl LandmarkDetector for PartialDetector {
            fn detect(&mut self, _frame: &Mat) -> Result<Option<LandmarkSet>> {
                let mut set = LandmarkSet::new();
                set.set(
                    crate::pose::landmark::LandmarkIndex::LeftHip,
                    Landmark::new(0.4, 0.6),
                );
                Ok(Some(set))
            }
        }

        let mut pipeline = PoseCapturePipeline::new();
        pipeline
            .start_with(fake_source(), Box::new(PartialDetector))
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        // 不完全な集合からは部分的なメトリクスを作らない
        assert_eq!(pipeline.latest_metrics(), None);
        assert_eq!(pipeline.state(), PipelineState::Running);

        pipeline.stop();
    }
}
