use anyhow::Result;
use std::io::{self, Write};

use putt_tracker::config::Config;
use putt_tracker::geometry::SpatialPoint;
use putt_tracker::pipeline::PoseCapturePipeline;
use putt_tracker::session::CalibrationSession;

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);

    println!("=== Putt Tracker - セットアップ ===");
    println!();
    println!("コマンド:");
    println!("  h x y z   - ホール位置を設定 (例: h 0 0 0)");
    println!("  p x y z   - パット位置を設定 (例: p 0 0 3)");
    println!("  l         - セットアップを確定");
    println!("  r         - リセット");
    println!("  s         - 現在の状態を表示");
    println!("  d         - 姿勢検出を開始");
    println!("  x         - 姿勢検出を停止");
    println!("  m         - 最新メトリクスを表示");
    println!("  q         - 終了");
    println!();

    let mut session = CalibrationSession::new();
    let mut pipeline = PoseCapturePipeline::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let parts: Vec<&str> = input.trim().split_whitespace().collect();

        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "h" if parts.len() == 4 => {
                let x: f32 = parts[1].parse()?;
                let y: f32 = parts[2].parse()?;
                let z: f32 = parts[3].parse()?;
                match session.set_hole_position(SpatialPoint::new(x, y, z)) {
                    Ok(()) => println!("ホール位置を設定: [{}, {}, {}]", x, y, z),
                    Err(e) => println!("エラー: {}", e),
                }
            }
            "p" if parts.len() == 4 => {
                let x: f32 = parts[1].parse()?;
                let y: f32 = parts[2].parse()?;
                let z: f32 = parts[3].parse()?;
                match session.set_putting_position(SpatialPoint::new(x, y, z)) {
                    Ok(()) => {
                        println!("パット位置を設定: [{}, {}, {}]", x, y, z);
                        println!("距離: {:.2} ft", session.distance_in_feet());
                        if let Some(camera) = session.suggested_camera_position() {
                            println!(
                                "推奨カメラ位置: [{:.3}, {:.3}, {:.3}]",
                                camera.x, camera.y, camera.z
                            );
                        }
                    }
                    Err(e) => println!("エラー: {}", e),
                }
            }
            "l" => match session.lock_setup() {
                Ok(()) => println!("セットアップを確定しました"),
                Err(e) => println!("エラー: {}", e),
            },
            "r" => {
                session.reset();
                println!("リセットしました");
            }
            "s" => {
                println!("状態: {}", session.state().name());
                match session.hole_position() {
                    Some(p) => println!("  ホール位置: [{:.3}, {:.3}, {:.3}]", p.x, p.y, p.z),
                    None => println!("  ホール位置: 未設定"),
                }
                match session.putting_position() {
                    Some(p) => println!("  パット位置: [{:.3}, {:.3}, {:.3}]", p.x, p.y, p.z),
                    None => println!("  パット位置: 未設定"),
                }
                match session.suggested_camera_position() {
                    Some(p) => println!("  推奨カメラ位置: [{:.3}, {:.3}, {:.3}]", p.x, p.y, p.z),
                    None => println!("  推奨カメラ位置: 未算出"),
                }
                println!("  距離: {:.2} ft", session.distance_in_feet());
                println!("  ロック: {}", session.is_locked());
            }
            "d" => match pipeline.start(&config) {
                Ok(()) => println!("姿勢検出を開始しました"),
                Err(e) => println!("エラー: {}", e),
            },
            "x" => {
                pipeline.stop();
                println!("姿勢検出を停止しました");
            }
            "m" => match pipeline.latest_metrics() {
                Some(metrics) => {
                    println!("体の傾き: {:.1}°", metrics.body_angle_rad.to_degrees());
                    println!("スタンス幅: {:.3}", metrics.stance_width);
                }
                None => println!("メトリクスなし"),
            },
            "q" => {
                pipeline.stop();
                println!("終了します");
                break;
            }
            _ => {
                println!("不明なコマンド: {}", parts[0]);
            }
        }
    }

    Ok(())
}
