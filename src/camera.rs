use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::CameraConfig;

/// プロセス内でキャプチャデバイスを保持中かどうか
static DEVICE_IN_USE: AtomicBool = AtomicBool::new(false);

/// キャプチャデバイスの排他的な使用権
///
/// プロセス内で同時に1つしか存在できない。Dropで解放され、
/// 解放後は次のclaim_capture()が即座に成功する。
pub struct CaptureClaim {
    _private: (),
}

/// 使用権を取得。既に保持されている場合はNone
pub fn claim_capture() -> Option<CaptureClaim> {
    if DEVICE_IN_USE
        .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
    {
        Some(CaptureClaim { _private: () })
    } else {
        None
    }
}

impl Drop for CaptureClaim {
    fn drop(&mut self) {
        DEVICE_IN_USE.store(false, Ordering::Release);
    }
}

/// OpenCVを使用したキャプチャデバイス
pub struct CaptureDevice {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl CaptureDevice {
    /// 設定に従ってカメラを開く
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let mut capture = VideoCapture::new(config.index, VideoCaptureAPIs::CAP_ANY as i32)
            .context("Failed to open camera")?;

        if !capture.is_opened()? {
            anyhow::bail!("Camera {} is not available", config.index);
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;
        capture.set(videoio::CAP_PROP_FPS, config.fps as f64)?;
        // 最新フレームのみ保持（古いフレームをドライバ側に溜めない）
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// フレームを読み込む（BGR形式）
    pub fn read_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        self.capture
            .read(&mut frame)
            .context("Failed to read frame")?;

        if frame.empty() {
            anyhow::bail!("Empty frame received");
        }

        Ok(frame)
    }
}

/// フレーム供給元。新しいフレームが届くまでブロックする
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Mat>;
}

/// 別スレッドでキャプチャし、最新フレームのみ保持する供給元
///
/// 検出が追いつかない間に届いたフレームは上書きされて破棄される
/// （キューに溜めず、常に新しさが保証される）。
/// stop / Drop でキャプチャスレッドをjoinし、デバイスを確実に解放する。
pub struct LatestFrame {
    latest: Arc<Mutex<Option<Mat>>>,
    frame_id: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    last_seen: u64,
    timeout: Duration,
}

impl LatestFrame {
    /// キャプチャスレッドを起動
    pub fn start(mut device: CaptureDevice, timeout: Duration) -> Self {
        let latest = Arc::new(Mutex::new(None::<Mat>));
        let latest_ref = latest.clone();
        let frame_id = Arc::new(AtomicU64::new(0));
        let frame_id_ref = frame_id.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_ref = stop.clone();

        let handle = thread::spawn(move || {
            while !stop_ref.load(Ordering::Relaxed) {
                match device.read_frame() {
                    Ok(frame) => {
                        *latest_ref.lock().unwrap() = Some(frame);
                        frame_id_ref.fetch_add(1, Ordering::Release);
                    }
                    Err(_) => {
                        thread::sleep(Duration::from_millis(5));
                    }
                }
            }
            // deviceはここでドロップされ、カメラが解放される
        });

        Self {
            latest,
            frame_id,
            stop,
            handle: Some(handle),
            last_seen: 0,
            timeout,
        }
    }
}

impl FrameSource for LatestFrame {
    /// まだ渡していない最新フレームを返す。timeoutを超えたらErr
    fn next_frame(&mut self) -> Result<Mat> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let id = self.frame_id.load(Ordering::Acquire);
            if id > self.last_seen {
                let frame = self.latest.lock().unwrap().as_ref().map(|m| m.clone());
                if let Some(frame) = frame {
                    self.last_seen = id;
                    return Ok(frame);
                }
            }
            if Instant::now() >= deadline {
                anyhow::bail!("Timed out waiting for a new frame");
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

impl Drop for LatestFrame {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// 使用権を扱うテストの直列化用（グローバルフラグを共有するため）
#[cfg(test)]
pub(crate) fn claim_test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
