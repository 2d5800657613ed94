use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use geo::Point;
use tracing::warn;
use ureq::Agent;

use crate::{overlay::overlay, utils::http_error};

/// Rendering parameters for the static images API.
#[derive(Debug, Clone)]
pub struct StaticMap {
    pub token: String,
    pub style: String,
    pub center: Point,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
}

impl StaticMap {
    pub fn url(&self, overlay: &str) -> String {
        let (lon, lat) = self.center.x_y();
        format!(
            "https://api.mapbox.com/styles/v1/{}/static/{overlay}/{lon:.6},{lat:.6},{},0,0/{}x{}@2x?access_token={}",
            self.style,
            self.zoom,
            self.width,
            self.height,
            urlencoding::encode(&self.token)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapJob {
    pub points: Vec<Point>,
    pub url: String,
}

/// Decides how many images are needed to show every marker.
///
/// One image if the full request fits under `max_url_len`, otherwise one per
/// `chunk_size` markers. The chunk size is not tuned to the limit.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    pub max_url_len: usize,
    pub chunk_size: usize,
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self {
            max_url_len: 7800,
            chunk_size: 100,
        }
    }
}

impl BatchPlanner {
    pub fn plan(&self, points: &[Point], map: &StaticMap) -> Vec<MapJob> {
        if points.is_empty() {
            return Vec::new();
        }

        let url = map.url(&overlay(points));
        if url.len() < self.max_url_len {
            return vec![MapJob {
                points: points.to_vec(),
                url,
            }];
        }

        points
            .chunks(self.chunk_size.max(1))
            .map(|x| MapJob {
                points: x.to_vec(),
                url: map.url(&overlay(x)),
            })
            .collect()
    }
}

pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

impl Fetch for Agent {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.get(url)
            .call()
            .map_err(|e| anyhow!(http_error(&e)))?
            .into_reader()
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// `out` itself for a single image, `<stem>_<n>.<ext>` (1-based) otherwise.
pub fn job_path(out: &Path, index: usize, total: usize) -> PathBuf {
    if total == 1 {
        return out.to_path_buf();
    }

    let stem = out
        .file_stem()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match out.extension() {
        Some(ext) => format!("{stem}_{}.{}", index + 1, ext.to_string_lossy()),
        None => format!("{stem}_{}", index + 1),
    };
    out.with_file_name(name)
}

#[derive(Debug, Default)]
pub struct MapReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Downloads every job in order. A job that fails is logged and skipped; the
/// rest still run.
pub fn write_images(jobs: &[MapJob], fetcher: &impl Fetch, out: &Path) -> MapReport {
    let mut report = MapReport::default();
    for (i, job) in jobs.iter().enumerate() {
        let path = job_path(out, i, jobs.len());
        println!("Downloading {} ({} markers)…", path.display(), job.points.len());

        match download(job, fetcher, &path) {
            Ok(()) => report.saved.push(path),
            Err(e) => {
                warn!("Failed to save {}: {e:#}", path.display());
                report.failed.push(path);
            }
        }
    }
    report
}

fn download(job: &MapJob, fetcher: &impl Fetch, path: &Path) -> Result<()> {
    let bytes = fetcher.fetch(&job.url)?;
    if let Some(parent) = path.parent().filter(|x| !x.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use anyhow::bail;
    use itertools::Itertools;

    use super::*;
    use crate::utils::testing::{serve_once, UNAUTHORIZED};

    fn map() -> StaticMap {
        StaticMap {
            token: "pk.test".to_string(),
            style: "mapbox/streets-v12".to_string(),
            center: Point::new(5.1214201, 52.0907374),
            zoom: 12,
            width: 1280,
            height: 1280,
        }
    }

    fn points(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(5.0 + i as f64 * 0.001, 52.0 + i as f64 * 0.0001))
            .collect()
    }

    #[test]
    fn static_url() {
        assert_eq!(
            map().url("pin-s+ff2d20(5.100000,52.000000)"),
            "https://api.mapbox.com/styles/v1/mapbox/streets-v12/static/pin-s+ff2d20(5.100000,52.000000)/5.121420,52.090737,12,0,0/1280x1280@2x?access_token=pk.test"
        );
    }

    #[test]
    fn plan_single() {
        let points = points(10);
        let jobs = BatchPlanner::default().plan(&points, &map());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].points, points);
        assert_eq!(jobs[0].url, map().url(&overlay(&points)));
    }

    #[test]
    fn plan_empty() {
        assert!(BatchPlanner::default().plan(&[], &map()).is_empty());
    }

    #[test]
    fn plan_chunks() {
        let points = points(250);
        assert!(map().url(&overlay(&points)).len() >= 7800);

        let jobs = BatchPlanner::default().plan(&points, &map());
        assert_eq!(jobs.iter().map(|x| x.points.len()).collect_vec(), vec![100, 100, 50]);
        assert_eq!(jobs.iter().flat_map(|x| x.points.clone()).collect_vec(), points);

        let points = self::points(300);
        let jobs = BatchPlanner::default().plan(&points, &map());
        assert_eq!(jobs.iter().map(|x| x.points.len()).collect_vec(), vec![100, 100, 100]);

        // fits under the limit, so no splitting even though it exceeds a chunk
        let jobs = BatchPlanner::default().plan(&points[..200], &map());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].points.len(), 200);
    }

    #[test]
    fn plan_threshold_is_exclusive() {
        let points = points(3);
        let len = map().url(&overlay(&points)).len();

        let fits = BatchPlanner {
            max_url_len: len + 1,
            chunk_size: 2,
        };
        assert_eq!(fits.plan(&points, &map()).len(), 1);

        let split = BatchPlanner {
            max_url_len: len,
            chunk_size: 2,
        };
        let jobs = split.plan(&points, &map());
        assert_eq!(jobs.iter().map(|x| x.points.len()).collect_vec(), vec![2, 1]);
    }

    #[test]
    fn output_paths() {
        let out = Path::new("maps/utrecht_markers.png");
        assert_eq!(job_path(out, 0, 1), PathBuf::from("maps/utrecht_markers.png"));
        assert_eq!(job_path(out, 0, 3), PathBuf::from("maps/utrecht_markers_1.png"));
        assert_eq!(job_path(out, 2, 3), PathBuf::from("maps/utrecht_markers_3.png"));
        assert_eq!(job_path(Path::new("markers"), 1, 2), PathBuf::from("markers_2"));
    }

    #[test]
    fn download_error_hides_token() {
        let (base, server) = serve_once(UNAUTHORIZED);
        let e = Agent::new()
            .fetch(&format!("{base}/static/x?access_token=pk.SECRET"))
            .unwrap_err();
        server.join().unwrap();

        let message = format!("{e:#}");
        assert!(message.contains("401"));
        assert!(!message.contains("pk.SECRET"));
    }

    struct FakeFetch;

    impl Fetch for FakeFetch {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            if url.contains("(5.100000") {
                bail!("connection reset");
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    #[test]
    fn failed_chunk_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out/markers.png");
        let jobs = points(250)
            .chunks(100)
            .map(|x| MapJob {
                points: x.to_vec(),
                url: map().url(&overlay(x)),
            })
            .collect_vec();

        let report = write_images(&jobs, &FakeFetch, &out);
        assert_eq!(report.failed, vec![dir.path().join("out/markers_2.png")]);
        assert_eq!(
            report.saved,
            vec![
                dir.path().join("out/markers_1.png"),
                dir.path().join("out/markers_3.png"),
            ]
        );
        assert_eq!(
            fs::read(&report.saved[1]).unwrap(),
            jobs[2].url.as_bytes()
        );
        assert!(!report.failed[0].exists());
    }
}
