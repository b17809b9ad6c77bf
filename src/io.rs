use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::curve::TraitPoint;
use crate::expectation::Landscape;
use crate::ivp::Trajectory;
use crate::optimize::Optimum;

pub struct LandscapeWriter {
    w: BufWriter<File>,
}

impl LandscapeWriter {
    pub fn create(path: &str) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self { w: BufWriter::new(f) })
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.w, "ctmin,b,ctmax,expected_fitness")?;
        Ok(())
    }

    pub fn write_field(&mut self, land: &Landscape) -> Result<()> {
        for (i, &b) in land.b_axis.iter().enumerate() {
            for (j, &ctmin) in land.ctmin_axis.iter().enumerate() {
                writeln!(
                    self.w,
                    "{:.6},{:.6},{:.6},{:.8e}",
                    ctmin,
                    b,
                    ctmin + b,
                    land.get(i, j)
                )?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

pub struct TrajectoryWriter {
    w: BufWriter<File>,
}

impl TrajectoryWriter {
    pub fn create(path: &str) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self { w: BufWriter::new(f) })
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.w, "t,ctmin,b,ctmax,topt")?;
        Ok(())
    }

    /// One row per accepted solver step; dense resampling is left to the
    /// solution object's query API.
    pub fn write_nodes(&mut self, traj: &Trajectory) -> Result<()> {
        for (t, y) in traj.ts.iter().zip(traj.ys.iter()) {
            let point = TraitPoint::new(y[0], y[1]);
            writeln!(
                self.w,
                "{:.6e},{:.6},{:.6},{:.6},{:.6}",
                t,
                point.ctmin,
                point.b,
                point.ctmax(),
                point.topt()
            )?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

pub struct OptimumWriter {
    w: BufWriter<File>,
}

impl OptimumWriter {
    pub fn create(path: &str) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self { w: BufWriter::new(f) })
    }

    pub fn write(&mut self, opt: &Optimum) -> Result<()> {
        writeln!(self.w, "ctmin,b,ctmax,expected_fitness,converged,iterations")?;
        writeln!(
            self.w,
            "{:.6},{:.6},{:.6},{:.8e},{},{}",
            opt.ctmin,
            opt.b,
            opt.ctmin + opt.b,
            opt.value,
            opt.converged,
            opt.iterations
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}
