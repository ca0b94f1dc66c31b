use blf_store::{BlfConfig, BlfFile, CanMessage, CompressionMethod, Record};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const RECORDS: u64 = 20_000;

fn frames() -> Vec<Record> {
	(0..RECORDS)
		.map(|i| {
			let data = i.to_le_bytes();
			Record::new(CanMessage { channel: 1, dlc: 8, id: (i % 0x7FF) as u32, data, ..Default::default() }, i * 250_000)
		})
		.collect()
}

fn bench_write(c: &mut Criterion) {
	let records = frames();
	let dir = tempfile::tempdir().unwrap();
	let mut group = c.benchmark_group("write");
	group.throughput(Throughput::Elements(RECORDS));
	for (method, background) in [
		(CompressionMethod::Zlib, false),
		(CompressionMethod::Zlib, true),
		(CompressionMethod::Lz4, false),
		(CompressionMethod::Zstd, false),
	] {
		let path = dir.path().join(format!("write-{}-{}.blf", method, background));
		let config = BlfConfig::default().with_compression(method).with_background_io(background);
		group.bench_with_input(BenchmarkId::new(method.to_string(), background), &config, |b, config| {
			b.iter(|| {
				let mut file = BlfFile::create(&path, config.clone()).unwrap();
				for record in &records {
					file.write(record).unwrap();
				}
				file.close().unwrap();
			});
		});
	}
	group.finish();
}

fn bench_read(c: &mut Criterion) {
	let records = frames();
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("read.blf");
	let mut file = BlfFile::create(&path, BlfConfig::default()).unwrap();
	for record in &records {
		file.write(record).unwrap();
	}
	file.close().unwrap();

	let mut group = c.benchmark_group("read");
	group.throughput(Throughput::Elements(RECORDS));
	for background in [false, true] {
		let config = BlfConfig::default().with_background_io(background);
		group.bench_with_input(BenchmarkId::new("sequential", background), &config, |b, config| {
			b.iter(|| {
				let mut file = BlfFile::open_with(&path, config.clone()).unwrap();
				let count = file.records().filter(|r| r.is_ok()).count();
				assert_eq!(count as u64, RECORDS);
			});
		});
	}
	group.finish();
}

criterion_group!(benches, bench_write, bench_read);
criterion_main!(benches);
