#[cfg(feature = "tls")]
use criterion::{criterion_group, criterion_main, Criterion};

#[cfg(feature = "tls")]
use pactmock::tls::MockTlsCertificates;

#[cfg(feature = "tls")]
pub fn tls_mock_tls_certificates_generate(c: &mut Criterion) {
    c.bench_function("MockTlsCertificates::generate", |b| {
        b.iter(MockTlsCertificates::generate)
    });
}

#[cfg(feature = "tls")]
pub fn tls_mock_tls_certificates_material(c: &mut Criterion) {
    let certificates = MockTlsCertificates::generate().unwrap();
    c.bench_function("MockTlsCertificates::material", |b| {
        b.iter(|| certificates.material())
    });
}

#[cfg(feature = "tls")]
criterion_group!(
    benches,
    tls_mock_tls_certificates_generate,
    tls_mock_tls_certificates_material
);

#[cfg(feature = "tls")]
criterion_main!(benches);

#[cfg(not(feature = "tls"))]
fn main() {}
