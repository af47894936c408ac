use gridlearn::prelude::*;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "maze" {
        let (w, h, seed) = (arg_u32(&args, 2, 15), arg_u32(&args, 3, 11), arg_u64(&args, 4, 42));
        run_maze(w, h, seed);
        return;
    }
    if args.len() >= 2 && args[1] == "train" {
        let (w, h, seed) = (arg_u32(&args, 2, 11), arg_u32(&args, 3, 11), arg_u64(&args, 4, 42));
        let steps = arg_u32(&args, 5, 50_000);
        run_train(w, h, seed, steps);
        return;
    }
    if args.len() >= 2 && args[1] == "room-demo" {
        run_room_demo();
        return;
    }

    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    run_train(11, 11, 42, 50_000);
}

fn print_help() {
    println!("gridlearn - tabular Q-learning sandbox\n");
    println!("Usage: gridlearn [command] [args]\n");
    println!("Commands:");
    println!("  (none)                          Train on an 11x11 maze and show the learned route");
    println!("  maze [w] [h] [seed]             Generate and print a maze");
    println!("  train [w] [h] [seed] [steps]    Generate a maze, train, print stats and greedy route");
    println!("  room-demo                       5x5 walled room with a trap beside the start");
}

fn arg_u32(args: &[String], i: usize, default: u32) -> u32 {
    args.get(i).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn arg_u64(args: &[String], i: usize, default: u64) -> u64 {
    args.get(i).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn run_maze(w: u32, h: u32, seed: u64) {
    match MazeGenerator::new(seed).generate(w, h) {
        Ok(grid) => {
            print!("{}", grid.render_ascii(None));
            println!(
                "{}x{} seed={} traps={} solvable={}",
                w,
                h,
                seed,
                grid.count(Cell::Trap),
                grid.is_solvable()
            );
        }
        Err(e) => {
            eprintln!("maze: {e}");
            std::process::exit(2);
        }
    }
}

fn run_train(w: u32, h: u32, seed: u64, steps: u32) {
    let cfg = TrainingConfig::default()
        .with_learning_rate(0.5)
        .with_discount_factor(0.95)
        .with_exploration(1.0, 0.97, 0.02);

    let mut sandbox = match Sandbox::with_maze(w, h, cfg, MazeConfig::default(), seed) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("train: {e}");
            std::process::exit(2);
        }
    };

    train_and_report(&mut sandbox, steps);
}

fn run_room_demo() {
    let mut grid = match GridWorld::with_border_walls(5, 5) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("room-demo: {e}");
            std::process::exit(2);
        }
    };
    let edits = [((3, 3), Cell::Goal), ((2, 1), Cell::Trap)];
    for ((x, y), cell) in edits {
        if let Err(e) = grid.set_cell(Position::new(x, y), cell) {
            eprintln!("room-demo: {e}");
            std::process::exit(2);
        }
    }

    let cfg = TrainingConfig::default()
        .with_learning_rate(0.5)
        .with_discount_factor(0.9)
        .with_exploration(1.0, 0.95, 0.01);
    let mut sandbox = Sandbox::from_grid(grid, cfg, 7);
    train_and_report(&mut sandbox, 5_000);

    if let Ok(v) = sandbox.values(sandbox.grid().start()) {
        println!("\nQ(start, ·):");
        for a in Action::ALL {
            println!("  {:<5} {:>9.3}", a.as_str(), v.get(a));
        }
    }
}

fn train_and_report(sandbox: &mut Sandbox, steps: u32) {
    println!("Layout:");
    print!("{}", sandbox.grid().render_ascii(None));

    sandbox.start();
    let chunk = (steps / 5).max(1);
    let mut done = 0;
    while done < steps {
        let n = chunk.min(steps - done);
        if let Err(e) = sandbox.run_steps(n) {
            eprintln!("training stopped: {e}");
            return;
        }
        done += n;
        let s = sandbox.stats();
        println!(
            "steps={:>7} episodes={:>5} goals={:>5} traps={:>4} recent_success={:.2} epsilon={:.3} last_len={}",
            s.total_steps,
            s.episodes,
            s.goals_reached,
            s.traps_hit,
            s.recent_success_rate(),
            s.epsilon,
            s.last_episode_steps
        );
    }
    sandbox.stop();

    let budget = sandbox.width() * sandbox.height();
    match sandbox.greedy_rollout(budget) {
        Ok(r) => {
            println!(
                "\nGreedy route: {} moves, reached_goal={}, bumps={}",
                r.path.len().saturating_sub(1),
                r.reached_goal,
                r.bumps
            );
            print!("{}", render_route(sandbox.grid(), &r.path));
        }
        Err(e) => eprintln!("rollout failed: {e}"),
    }
}

fn render_route(grid: &GridWorld, path: &[Position]) -> String {
    let mut rows: Vec<Vec<char>> = grid
        .render_ascii(None)
        .lines()
        .map(|l| l.chars().collect())
        .collect();
    for p in path.iter().skip(1) {
        let c = &mut rows[p.y as usize][p.x as usize];
        if *c == '.' {
            *c = '*';
        }
    }
    rows.into_iter()
        .map(|r| r.into_iter().collect::<String>() + "\n")
        .collect()
}
