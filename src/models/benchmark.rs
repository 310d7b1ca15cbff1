//! 年级 WCPM 基准表

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// 单个年级的基准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeBenchmark {
    pub low: u32,
    pub target: u32,
}

static GRADE_BENCHMARKS: phf::Map<&'static str, GradeBenchmark> = phf_map! {
    "1" => GradeBenchmark { low: 40, target: 60 },
    "2" => GradeBenchmark { low: 72, target: 100 },
    "3" => GradeBenchmark { low: 92, target: 112 },
    "4" => GradeBenchmark { low: 104, target: 133 },
    "5" => GradeBenchmark { low: 115, target: 146 },
    "6" => GradeBenchmark { low: 120, target: 146 },
    "7" => GradeBenchmark { low: 125, target: 150 },
    "8" => GradeBenchmark { low: 130, target: 151 },
};

/// 基准分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkStatus {
    Above,
    OnTrack,
    Below,
    Unknown,
}

impl std::fmt::Display for BenchmarkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchmarkStatus::Above => write!(f, "高于目标"),
            BenchmarkStatus::OnTrack => write!(f, "达标中"),
            BenchmarkStatus::Below => write!(f, "低于基准"),
            BenchmarkStatus::Unknown => write!(f, "未知"),
        }
    }
}

/// 查询年级基准，接受 "3"、"3rd"、"grade 3" 等写法
pub fn benchmark_for(grade: &str) -> Option<GradeBenchmark> {
    let digits: String = grade.chars().filter(|c| c.is_ascii_digit()).collect();
    GRADE_BENCHMARKS.get(digits.as_str()).copied()
}

/// 按年级对 WCPM 分类；年级缺失或未收录时为 `Unknown`
pub fn classify(wcpm: u32, grade: Option<&str>) -> BenchmarkStatus {
    let Some(benchmark) = grade.and_then(benchmark_for) else {
        return BenchmarkStatus::Unknown;
    };
    if wcpm >= benchmark.target {
        BenchmarkStatus::Above
    } else if wcpm >= benchmark.low {
        BenchmarkStatus::OnTrack
    } else {
        BenchmarkStatus::Below
    }
}
