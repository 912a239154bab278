use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::{
    core::{AlgorithmHint, Mat, Size, CV_32FC3},
    imgproc,
    prelude::*,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use super::landmark::{Landmark, LandmarkIndex, LandmarkSet};

/// 外部ランドマーク検出器との境界
///
/// 検出失敗はErr、検出結果なしはOk(None)。どちらの場合も
/// 呼び出し側はそのフレームを破棄して次に進む。
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Mat) -> Result<Option<LandmarkSet>>;
}

/// MoveNet用の入力サイズ
const MOVENET_INPUT_SIZE: i32 = 192;

/// MoveNetの17関節出力のうち、スタンス解析に使う体幹関節
const MOVENET_TORSO_JOINTS: [(usize, LandmarkIndex); 4] = [
    (5, LandmarkIndex::LeftShoulder),
    (6, LandmarkIndex::RightShoulder),
    (11, LandmarkIndex::LeftHip),
    (12, LandmarkIndex::RightHip),
];

/// MoveNetによる体幹ランドマーク検出器
pub struct MoveNetDetector {
    session: Session,
    confidence_threshold: f32,
}

impl MoveNetDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P, confidence_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self {
            session,
            confidence_threshold,
        })
    }
}

impl LandmarkDetector for MoveNetDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Option<LandmarkSet>> {
        let input = preprocess_for_movenet(frame)?;
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Inference failed")?;

        // MoveNet の出力は [1, 1, 17, 3] (y, x, confidence)
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        let mut landmarks = LandmarkSet::new();
        for (movenet_idx, joint) in MOVENET_TORSO_JOINTS {
            let y = output[[0, 0, movenet_idx, 0]];
            let x = output[[0, 0, movenet_idx, 1]];
            let confidence = output[[0, 0, movenet_idx, 2]];

            // 信頼度不足の関節は欠損として扱う
            if confidence >= self.confidence_threshold {
                landmarks.set(joint, Landmark::new(x, y));
            }
        }

        Ok(Some(landmarks))
    }
}

/// BGRフレームをMoveNet入力テンソル [1, 192, 192, 3] に変換
fn preprocess_for_movenet(frame: &Mat) -> Result<Array4<f32>> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(
        frame,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;

    let mut resized = Mat::default();
    imgproc::resize(
        &rgb,
        &mut resized,
        Size::new(MOVENET_INPUT_SIZE, MOVENET_INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut float_mat = Mat::default();
    resized.convert_to(&mut float_mat, CV_32FC3, 1.0, 0.0)?;

    // リサイズ・変換後のMatは連続なのでバッファから直接構築できる
    let size = MOVENET_INPUT_SIZE as usize;
    let pixels = float_mat
        .data_typed::<opencv::core::Vec3f>()
        .context("Non-continuous Mat after resize")?;

    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    for (i, pixel) in pixels.iter().enumerate() {
        let y = i / size;
        let x = i % size;
        tensor[[0, y, x, 0]] = pixel[0];
        tensor[[0, y, x, 1]] = pixel[1];
        tensor[[0, y, x, 2]] = pixel[2];
    }

    Ok(tensor)
}
