// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Storage driver module
//
// Provides a trait-based abstraction over the places backup metadata lives
// (local directories, mounted NFS exports, S3-compatible object stores).
// Drivers are chosen per destination URL by the resolver.

pub mod backend;
pub mod filesystem;
pub mod resolver;
pub mod s3;

pub use backend::BackupStoreDriver;
pub use filesystem::FilesystemDriver;
pub use resolver::{DriverFactoryFn, DriverResolver};
pub use s3::{S3Driver, S3Settings};
