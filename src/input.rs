use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::thread;

use ac3spdif::utils::clock::Mtime;
use ac3spdif::utils::errors::InputError;
use ac3spdif::utils::fifo::{Packet, PacketFifo};
use anyhow::Result;

/// Unified input reader that handles both file and pipe input with buffered reading
pub struct InputReader {
    reader: Box<dyn Read>,
    is_pipe: bool,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path_str = input_path.as_ref().to_string_lossy();
        let is_pipe = path_str == "-";

        let reader: Box<dyn Read> = if is_pipe {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(input_path)?;
            Box::new(BufReader::new(file))
        };

        Ok(Self { reader, is_pipe })
    }

    /// Read a chunk of data into the provided buffer
    /// Returns the number of bytes read, 0 indicates EOF
    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let bytes_read = self.reader.read(buffer)?;
        Ok(bytes_read)
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Process data in chunks using a callback function
    /// The callback receives each chunk and should return Ok(true) to continue or Ok(false) to stop
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = self.read_chunk(&mut buffer)?;
            if bytes_read == 0 {
                break; // EOF
            }

            if !callback(&buffer[..bytes_read])? {
                break; // Callback requested stop
            }
        }

        Ok(())
    }
}

pub struct FeederConfig {
    pub input_path: PathBuf,
    pub packet_size: usize,
    /// Timestamp of the first packet; later packets carry none.
    pub first_pts: Option<Mtime>,
    pub fifo: PacketFifo,
}

/// Reads the input on its own thread and queues it as packets.
///
/// The FIFO is marked ended at EOF and failed on a read error. A stopped
/// FIFO ends the thread quietly. Returns the number of bytes queued.
pub fn spawn_feeder(config: FeederConfig) -> thread::JoinHandle<Result<u64>> {
    thread::spawn(move || -> Result<u64> {
        let FeederConfig {
            input_path,
            packet_size,
            mut first_pts,
            fifo,
        } = config;

        let mut bytes_fed = 0u64;

        let result = InputReader::new(&input_path).and_then(|mut input_reader| {
            if input_reader.is_pipe() {
                log::debug!("Reading packets from stdin");
            }

            input_reader.process_chunks(packet_size, |chunk| {
                match fifo.push(Packet::new(chunk.to_vec(), first_pts.take())) {
                    Ok(()) => {
                        bytes_fed += chunk.len() as u64;
                        Ok(true)
                    }
                    Err(InputError::Stopped) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            })
        });

        match result {
            Ok(()) => {
                fifo.end_of_stream();
                log::debug!("Input complete: {bytes_fed} bytes queued");
                Ok(bytes_fed)
            }
            Err(e) => {
                fifo.fail();
                Err(e)
            }
        }
    })
}
