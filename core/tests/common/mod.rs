use coursematch_core::tokenizer::tokenize;
use coursematch_core::{Corpus, Document, EmbedError, Embedder, Prerequisite};

/// Bag-of-words feature hashing; deterministic and offline.
pub struct HashingEmbedder {
    pub dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim } }

    fn bucket(&self, token: &str) -> usize {
        // FNV-1a
        let mut h: u64 = 0xcbf29ce484222325;
        for b in token.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % self.dim as u64) as usize
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dim];
        for tok in tokenize(text) {
            v[self.bucket(&tok)] += 1.0;
        }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str { "hashing-test" }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Embedder that always fails, standing in for an unreachable provider.
pub struct DownEmbedder;

impl Embedder for DownEmbedder {
    fn model_id(&self) -> &str { "down" }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Request("connection refused".into()))
    }
}

pub fn course(id: &str, section: &str, title: &str, description: &str, department: &str, level: &str) -> Document {
    Document {
        offering_id: Some(id.into()),
        section_id: Some(section.into()),
        title: Some(title.into()),
        description: Some(description.into()),
        department: Some(department.into()),
        level: Some(level.into()),
        ..Default::default()
    }
}

pub fn catalog() -> Corpus {
    let mut docs = vec![
        course("EN.601.475", "01", "Machine Learning", "Statistical learning, neural networks and machine intelligence.", "EN Computer Science", "Upper Level Undergraduate"),
        course("EN.601.475", "02", "Machine Learning", "Statistical learning, neural networks and machine intelligence.", "EN Computer Science", "Upper Level Undergraduate"),
        course("EN.601.220", "01", "Intermediate Programming", "Programming in C and C++ with memory management.", "EN Computer Science", "Lower Level Undergraduate"),
        course("EN.601.226", "01", "Data Structures", "Lists, trees, hash tables and graphs in Java.", "EN Computer Science", "Lower Level Undergraduate"),
        course("EN.601.682", "01", "Deep Learning", "Neural networks for vision and language.", "EN Computer Science", "Graduate"),
        course("AS.110.201", "01", "Linear Algebra", "Vector spaces, matrices and eigenvalues.", "AS Mathematics", "Lower Level Undergraduate"),
        course("AS.389.201", "01", "Poetry Workshop", "Reading and writing verse.", "AS Writing Seminars", "Lower Level Undergraduate"),
        course("EN.530.420", "01", "Robot Sensors and Actuators", "Mechatronics for robotic machine design.", "EN Mechanical Engineering", "Upper Level Undergraduate"),
    ];
    docs[4].prerequisites = vec![Prerequisite { description: "EN.601.475 Machine Learning".into() }];
    docs[4].areas = Some("EN".into());
    Corpus::new(docs)
}
