use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub pose: PoseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// カメラインデックス
    #[serde(default = "default_camera_index")]
    pub index: i32,
    /// キャプチャ解像度（横）
    #[serde(default = "default_width")]
    pub width: u32,
    /// キャプチャ解像度（縦）
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoseConfig {
    /// ONNXモデルのパス
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// ランドマーク採用の信頼度閾値
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// 新フレーム待ちの上限（ミリ秒）
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
}

fn default_camera_index() -> i32 { 0 }
fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_fps() -> u32 { 60 }
fn default_model_path() -> String { "models/movenet_lightning.onnx".to_string() }
fn default_confidence_threshold() -> f32 { 0.3 }
fn default_frame_timeout_ms() -> u64 { 1000 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: default_camera_index(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            confidence_threshold: default_confidence_threshold(),
            frame_timeout_ms: default_frame_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルが読めない場合はデフォルト設定を使用
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.camera.index, 0);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert_eq!(config.pose.model_path, "models/movenet_lightning.onnx");
        assert!((config.pose.confidence_threshold - 0.3).abs() < 1e-6);
        assert_eq!(config.pose.frame_timeout_ms, 1000);
    }

    #[test]
    fn test_parse_partial_toml() {
        // 省略したフィールドはデフォルトで補完される
        let config: Config = toml::from_str(
            r#"
            [camera]
            index = 1
            width = 1280

            [pose]
            confidence_threshold = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.index, 1);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.camera.height, 480);
        assert!((config.pose.confidence_threshold - 0.5).abs() < 1e-6);
        assert_eq!(config.pose.model_path, "models/movenet_lightning.onnx");
    }

    #[test]
    fn test_parse_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.camera.fps, 60);
        assert_eq!(config.pose.frame_timeout_ms, 1000);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("nonexistent-config.toml");
        assert_eq!(config.camera.index, 0);
    }
}
