use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-wide counters exposed on `/metrics`.
#[derive(Clone)]
pub struct Metrics {
    pub logins: Arc<AtomicU64>,
    pub failed_logins: Arc<AtomicU64>,
    pub registrations: Arc<AtomicU64>,
    pub books_created: Arc<AtomicU64>,
    pub book_reads: Arc<AtomicU64>,
    pub book_downloads: Arc<AtomicU64>,
    pub reviews_created: Arc<AtomicU64>,
    pub reviews_rejected: Arc<AtomicU64>,
    pub access_denied: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            logins: Arc::new(AtomicU64::new(0)),
            failed_logins: Arc::new(AtomicU64::new(0)),
            registrations: Arc::new(AtomicU64::new(0)),
            books_created: Arc::new(AtomicU64::new(0)),
            book_reads: Arc::new(AtomicU64::new(0)),
            book_downloads: Arc::new(AtomicU64::new(0)),
            reviews_created: Arc::new(AtomicU64::new(0)),
            reviews_rejected: Arc::new(AtomicU64::new(0)),
            access_denied: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_logins(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed_logins(&self) {
        self.failed_logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_books_created(&self) {
        self.books_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_book_reads(&self) {
        self.book_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_book_downloads(&self) {
        self.book_downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reviews_created(&self) {
        self.reviews_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reviews_rejected(&self) {
        self.reviews_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_access_denied(&self) {
        self.access_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            logins: self.logins.load(Ordering::Relaxed),
            failed_logins: self.failed_logins.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            books_created: self.books_created.load(Ordering::Relaxed),
            book_reads: self.book_reads.load(Ordering::Relaxed),
            book_downloads: self.book_downloads.load(Ordering::Relaxed),
            reviews_created: self.reviews_created.load(Ordering::Relaxed),
            reviews_rejected: self.reviews_rejected.load(Ordering::Relaxed),
            access_denied: self.access_denied.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub logins: u64,
    pub failed_logins: u64,
    pub registrations: u64,
    pub books_created: u64,
    pub book_reads: u64,
    pub book_downloads: u64,
    pub reviews_created: u64,
    pub reviews_rejected: u64,
    pub access_denied: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition (format 0.0.4).
    pub fn to_prometheus(&self) -> String {
        let counters = [
            ("logins", "Successful logins", self.logins),
            ("failed_logins", "Rejected login attempts", self.failed_logins),
            ("registrations", "Accounts registered", self.registrations),
            ("books_created", "Books added to the catalog", self.books_created),
            ("book_reads", "Presigned read URLs issued", self.book_reads),
            ("book_downloads", "Presigned download URLs issued", self.book_downloads),
            ("reviews_created", "Reviews created", self.reviews_created),
            ("reviews_rejected", "Reviews rejected by validation", self.reviews_rejected),
            ("access_denied", "Requests refused by the access gate", self.access_denied),
        ];
        let mut out = String::new();
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP biblioteca_{name} {help}\n# TYPE biblioteca_{name} counter\nbiblioteca_{name} {value}\n"
            ));
        }
        out.push_str(&format!(
            "# HELP biblioteca_uptime_seconds Uptime seconds\n# TYPE biblioteca_uptime_seconds gauge\nbiblioteca_uptime_seconds {}\n",
            self.uptime_seconds
        ));
        out
    }
}
